//! Topic catalog: templates, identifier codecs and rule resolution.

mod codec;
mod manager;
mod template;

pub use codec::{CodecError, IdentifierCodec};
pub use manager::{TopicError, TopicManager, TopicRule};
pub use template::{RenderError, Template, TemplateError};
