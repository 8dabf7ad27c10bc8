#![no_main]
use ciborium::de::from_reader;
use libfuzzer_sys::fuzz_target;
use schimmy_core::{merge, Node, PropagationConfig, WireRecord};

fuzz_target!(|data: &[u8]| {
    if let Ok(rec) = from_reader::<WireRecord, _>(data) {
        let node = Node::from_wire(rec);
        // Any decodable record must survive a merge against itself.
        let _ = merge(node.address, None, vec![node], &PropagationConfig::default());
    }
    let _ = serde_json::from_slice::<Node>(data);
});
