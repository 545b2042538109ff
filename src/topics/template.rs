//! Topic pattern templates.
//!
//! A template is regular-expression source with `{{ expr }}` placeholders:
//!
//! ```text
//! ^{{company}}/{{entity}}/{{Digest(DecodeId(sub, iss))}}/superapp$
//! ```
//!
//! An expression is a variable (`company`, `iss`, `sub`, `entity`, `peer`), a double-quoted
//! string literal, or a call to one of the fixed functions `EntityOf`, `PeerOf`, `DecodeId` and
//! `Digest`. Templates are parsed once when the catalog is built; names and arities are checked
//! then, so rendering only evaluates a closed expression tree. Values substituted for a
//! placeholder are regex-escaped.

use std::fmt;

use super::codec::CodecError;

/// Request-scoped values a template can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variable {
    Company,
    Iss,
    Sub,
    /// Shorthand for `EntityOf(iss)`.
    Entity,
    /// Shorthand for `PeerOf(iss)`.
    Peer,
}

impl Variable {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "company" => Some(Variable::Company),
            "iss" => Some(Variable::Iss),
            "sub" => Some(Variable::Sub),
            "entity" => Some(Variable::Entity),
            "peer" => Some(Variable::Peer),
            _ => None,
        }
    }
}

/// The fixed function table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    /// `EntityOf(issuer)`: topic segment naming the issuer's actor class.
    EntityOf,
    /// `PeerOf(issuer)`: topic segment naming the issuer's counterpart.
    PeerOf,
    /// `DecodeId(value, issuer)`: numeric id behind an obfuscated subject.
    DecodeId,
    /// `Digest(value)`: hex digest of the prefixed value.
    Digest,
}

impl Function {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "EntityOf" => Some(Function::EntityOf),
            "PeerOf" => Some(Function::PeerOf),
            "DecodeId" => Some(Function::DecodeId),
            "Digest" => Some(Function::Digest),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Function::EntityOf => "EntityOf",
            Function::PeerOf => "PeerOf",
            Function::DecodeId => "DecodeId",
            Function::Digest => "Digest",
        }
    }

    fn arity(self) -> usize {
        match self {
            Function::EntityOf | Function::PeerOf | Function::Digest => 1,
            Function::DecodeId => 2,
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Var(Variable),
    Literal(String),
    Call(Function, Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Placeholder(Expr),
}

/// Supplies variable values and function results while a template renders.
pub trait Resolver {
    fn variable(&self, variable: Variable) -> Result<String, RenderError>;

    /// `args` has already been checked against the function's arity.
    fn call(&self, function: Function, args: &[String]) -> Result<String, RenderError>;
}

/// Errors found while parsing a template.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("unclosed placeholder starting at byte {0}")]
    Unclosed(usize),

    #[error("empty placeholder at byte {0}")]
    Empty(usize),

    #[error("unknown variable {0:?}")]
    UnknownVariable(String),

    #[error("unknown function {0:?}")]
    UnknownFunction(String),

    #[error("{function} takes {expected} argument(s), got {found}")]
    Arity {
        function: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("invalid placeholder {expr:?}: {message}")]
    Syntax { expr: String, message: String },
}

/// Errors raised while rendering a template for one request.
///
/// These disqualify a single rule; they are never fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Decode(#[from] CodecError),

    #[error("no identifier codec configured for issuer {0:?}")]
    MissingCodec(String),

    #[error("issuer {issuer:?} has no {map} mapping and no default")]
    Unmapped { issuer: String, map: &'static str },

    #[error("{function} called with {found} argument(s)")]
    Arity { function: &'static str, found: usize },
}

/// A parsed topic template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut rest = source;
        let mut offset = 0;

        while let Some(open) = rest.find("{{") {
            if open > 0 {
                segments.push(Segment::Text(rest[..open].to_string()));
            }

            let start = offset + open;
            let body_start = open + 2;
            let close = rest[body_start..]
                .find("}}")
                .ok_or(TemplateError::Unclosed(start))?;
            let body = rest[body_start..body_start + close].trim();
            if body.is_empty() {
                return Err(TemplateError::Empty(start));
            }

            segments.push(Segment::Placeholder(ExprParser::new(body).parse()?));

            let consumed = body_start + close + 2;
            rest = &rest[consumed..];
            offset += consumed;
        }

        if !rest.is_empty() {
            segments.push(Segment::Text(rest.to_string()));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Render to regex source, escaping every substituted value.
    pub fn render<R: Resolver + ?Sized>(&self, resolver: &R) -> Result<String, RenderError> {
        let mut out = String::with_capacity(self.source.len() + 32);
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Placeholder(expr) => {
                    out.push_str(&regex::escape(&evaluate(expr, resolver)?));
                }
            }
        }
        Ok(out)
    }

    /// Render with a fixed neutral value in every placeholder.
    ///
    /// Substituted values are always escaped, so the literal text alone decides whether the
    /// rendered pattern is a valid regex. This lets the catalog reject bad patterns at build time.
    pub fn probe(&self) -> String {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Text(text) => text.as_str(),
                Segment::Placeholder(_) => "probe",
            })
            .collect()
    }
}

fn evaluate<R: Resolver + ?Sized>(expr: &Expr, resolver: &R) -> Result<String, RenderError> {
    match expr {
        Expr::Var(variable) => resolver.variable(*variable),
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Call(function, args) => {
            let values = args
                .iter()
                .map(|arg| evaluate(arg, resolver))
                .collect::<Result<Vec<_>, _>>()?;
            resolver.call(*function, &values)
        }
    }
}

/// Recursive-descent parser for a single placeholder body.
struct ExprParser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> ExprParser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn parse(mut self) -> Result<Expr, TemplateError> {
        let expr = self.expr()?;
        self.skip_whitespace();
        if self.pos < self.src.len() {
            return Err(self.syntax(format!(
                "unexpected trailing input {:?}",
                &self.src[self.pos..]
            )));
        }
        Ok(expr)
    }

    fn expr(&mut self) -> Result<Expr, TemplateError> {
        self.skip_whitespace();
        match self.peek() {
            Some('"') => self.literal(),
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                let name = self.identifier();
                self.skip_whitespace();
                if self.peek() == Some('(') {
                    self.pos += 1;
                    let function = Function::from_name(name)
                        .ok_or_else(|| TemplateError::UnknownFunction(name.to_string()))?;
                    let args = self.arguments()?;
                    if args.len() != function.arity() {
                        return Err(TemplateError::Arity {
                            function: function.name(),
                            expected: function.arity(),
                            found: args.len(),
                        });
                    }
                    Ok(Expr::Call(function, args))
                } else {
                    Variable::from_name(name)
                        .map(Expr::Var)
                        .ok_or_else(|| TemplateError::UnknownVariable(name.to_string()))
                }
            }
            Some(c) => Err(self.syntax(format!("unexpected character {c:?}"))),
            None => Err(self.syntax("expected an expression".to_string())),
        }
    }

    fn arguments(&mut self) -> Result<Vec<Expr>, TemplateError> {
        let mut args = Vec::new();
        self.skip_whitespace();
        if self.peek() == Some(')') {
            self.pos += 1;
            return Ok(args);
        }

        loop {
            args.push(self.expr()?);
            self.skip_whitespace();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(')') => {
                    self.pos += 1;
                    return Ok(args);
                }
                _ => return Err(self.syntax("expected ',' or ')'".to_string())),
            }
        }
    }

    fn literal(&mut self) -> Result<Expr, TemplateError> {
        let body_start = self.pos + 1;
        let end = self.src[body_start..]
            .find('"')
            .ok_or_else(|| self.syntax("unterminated string literal".to_string()))?;
        self.pos = body_start + end + 1;
        Ok(Expr::Literal(
            self.src[body_start..body_start + end].to_string(),
        ))
    }

    fn identifier(&mut self) -> &'a str {
        let start = self.pos;
        let len = self.src[start..]
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(self.src.len() - start);
        self.pos = start + len;
        &self.src[start..self.pos]
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.src[self.pos..].trim_start();
        self.pos = self.src.len() - trimmed.len();
    }

    fn syntax(&self, message: String) -> TemplateError {
        TemplateError::Syntax {
            expr: self.src.to_string(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    /// Resolver with fixed values that records nothing.
    struct Fixed;

    impl Resolver for Fixed {
        fn variable(&self, variable: Variable) -> Result<String, RenderError> {
            Ok(match variable {
                Variable::Company => "snapp",
                Variable::Iss => "0",
                Variable::Sub => "abc.def",
                Variable::Entity => "driver",
                Variable::Peer => "passenger",
            }
            .to_string())
        }

        fn call(&self, function: Function, args: &[String]) -> Result<String, RenderError> {
            match function {
                Function::EntityOf => Ok(format!("entity[{}]", args[0])),
                Function::PeerOf => Ok(format!("peer[{}]", args[0])),
                Function::DecodeId if args[0] == "bad" => Err(RenderError::Decode(
                    CodecError::Decode {
                        value: args[0].clone(),
                        reason: "test".to_string(),
                    },
                )),
                Function::DecodeId => Ok(format!("id({},{})", args[0], args[1])),
                Function::Digest => Ok(format!("h{}", args[0].len())),
            }
        }
    }

    #[test]
    fn test_literal_only() {
        let template = Template::parse("^bucks$").unwrap();
        assert_eq!(template.render(&Fixed).unwrap(), "^bucks$");
        assert_eq!(template.source(), "^bucks$");
    }

    #[test]
    fn test_variables() {
        let template = Template::parse("^{{company}}/{{ entity }}/{{sub}}/{{peer}}-location$").unwrap();
        // `.` in the subject is escaped
        assert_eq!(
            template.render(&Fixed).unwrap(),
            r"^snapp/driver/abc\.def/passenger-location$"
        );
    }

    #[test]
    fn test_nested_calls() {
        let template = Template::parse("^{{Digest(DecodeId(sub, iss))}}$").unwrap();
        // "id(abc.def,0)" has 13 characters
        assert_eq!(template.render(&Fixed).unwrap(), "^h13$");
    }

    #[test]
    fn test_string_literal_argument() {
        let template = Template::parse(r#"{{EntityOf("1")}}/{{PeerOf(iss)}}"#).unwrap();
        assert_eq!(
            template.render(&Fixed).unwrap(),
            r"entity\[1\]/peer\[0\]"
        );
    }

    #[test]
    fn test_render_error_propagates() {
        struct BadSub;
        impl Resolver for BadSub {
            fn variable(&self, variable: Variable) -> Result<String, RenderError> {
                match variable {
                    Variable::Sub => Ok("bad".to_string()),
                    other => Fixed.variable(other),
                }
            }
            fn call(&self, function: Function, args: &[String]) -> Result<String, RenderError> {
                Fixed.call(function, args)
            }
        }

        let template = Template::parse("^{{DecodeId(sub, iss)}}$").unwrap();
        assert!(matches!(
            template.render(&BadSub),
            Err(RenderError::Decode(_))
        ));
    }

    #[test]
    fn test_probe() {
        let template = Template::parse("^{{company}}/call/[a-z]+/{{sub}}$").unwrap();
        assert_eq!(template.probe(), "^probe/call/[a-z]+/probe$");
    }

    #[rstest]
    #[case::unclosed("^{{company$", TemplateError::Unclosed(1))]
    #[case::empty("^{{  }}$", TemplateError::Empty(1))]
    #[case::unknown_variable("{{tenant}}", TemplateError::UnknownVariable("tenant".into()))]
    #[case::unknown_function("{{Exec(sub)}}", TemplateError::UnknownFunction("Exec".into()))]
    #[case::arity(
        "{{DecodeId(sub)}}",
        TemplateError::Arity { function: "DecodeId", expected: 2, found: 1 }
    )]
    fn test_parse_errors(#[case] source: &str, #[case] expected: TemplateError) {
        assert_eq!(Template::parse(source).unwrap_err(), expected);
    }

    #[rstest]
    #[case::trailing("{{sub iss}}")]
    #[case::unterminated_string(r#"{{EntityOf("0)}}"#)]
    #[case::missing_paren("{{Digest(sub}}")]
    #[case::leading_dot("{{.company}}")]
    fn test_syntax_errors(#[case] source: &str) {
        assert!(matches!(
            Template::parse(source),
            Err(TemplateError::Syntax { .. })
        ));
    }
}
