pub mod runtime;

pub use runtime::probe_java;
pub use runtime::resolve_java_binary;
pub use runtime::JavaInstallation;
