use std::sync::LazyLock;

/// Version of the software as declared by the Cargo package.
pub static VERSION: LazyLock<String> = LazyLock::new(|| env!("CARGO_PKG_VERSION").to_string());
