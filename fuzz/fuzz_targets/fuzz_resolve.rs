#![no_main]

use libfuzzer_sys::fuzz_target;
use nx_bridge::{BridgeConfig, MemoryArchive, MemoryNode, MemoryOpener, NxBridge};
use std::sync::Arc;

fuzz_target!(|data: &[u8]| {
    let Ok(path) = std::str::from_utf8(data) else {
        return;
    };

    let opener = Arc::new(MemoryOpener::new());
    opener.insert(
        "fuzz/Map.nx",
        MemoryArchive::new(
            MemoryNode::new("").with_child(
                MemoryNode::new("Obj")
                    .with_child(MemoryNode::vector("origin", 1, 2))
                    .with_child(MemoryNode::string("_outlink", path)),
            ),
        ),
    );
    let bridge = NxBridge::new(BridgeConfig::new("fuzz"), opener);

    // Resolution of arbitrary paths and links should fail cleanly, never panic
    if let Ok(node) = bridge.resolve(path) {
        let _ = bridge.node_type(node);
        let _ = bridge.get_origin(node);
        let _ = bridge.resolve_from(node, path);
    }
    if let Ok(obj) = bridge.resolve("Map.nx/Obj") {
        let _ = bridge.resolve_outlink(obj);
    }
    bridge.teardown();
});
