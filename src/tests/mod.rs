//! End-to-end scenarios across configuration, authenticators and topic rules.
