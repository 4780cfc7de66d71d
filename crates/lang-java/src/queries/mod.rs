pub const JAVA_IDENTIFIERS_SCM: &str = include_str!("java_identifiers.scm");
