//! Tracing subscriber set-up.
//!
//! Log output is an indented tree: every script line opens a span, so the
//! messages of nested loop iterations line up under the line that produced
//! them.  `RUST_LOG` overrides the default filter.

use std::sync::Once;

use tracing_subscriber::{prelude::*, EnvFilter};
use tracing_tree::HierarchicalLayer;

static INIT: Once = Once::new();

/// Default filter: `debug` raises the crate's level from `info`.
pub fn default_filter(debug: bool) -> &'static str {
    if debug {
        "idfexp=debug"
    } else {
        "idfexp=info"
    }
}

/// Install the global subscriber.  Later calls are no-ops.
pub fn init(debug: bool) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_filter(debug)));
        let tree = HierarchicalLayer::new(2)
            .with_writer(std::io::stderr)
            .with_targets(false)
            .with_indent_lines(true);
        // A host application may already have installed a subscriber.
        let _ = tracing_subscriber::registry().with(tree).with(filter).try_init();
    });
}
