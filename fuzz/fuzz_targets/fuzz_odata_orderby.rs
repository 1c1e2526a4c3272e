#![no_main]

use libfuzzer_sys::fuzz_target;
use odata_query::{ElementType, FieldKind, TypeRegistry, parse_orderby};

fuzz_target!(|data: &[u8]| {
    // Limit input size to avoid OOM on pathological inputs
    if data.len() > 1024 {
        return;
    }
    if let Ok(s) = std::str::from_utf8(data) {
        let registry = TypeRegistry::builder()
            .element_type(
                ElementType::builder("Item")
                    .field("id", FieldKind::I64)
                    .field("name", FieldKind::String)
                    .navigation("parent", "Item"),
            )
            .build()
            .unwrap();
        let item = registry.element_type("Item").unwrap();
        let _ = parse_orderby(s, &registry, item);
    }
});
