//! End-to-end workflows over a `Workspace`: sources, mappings, simulation,
//! code generation and persistence.

use serde_json::json;

use api_integrator::*;

// ─────────────────────── helpers ───────────────────────

fn source_a() -> SourcePatch {
    SourcePatch {
        receive_endpoint: Some("https://a/x".into()),
        receive_response_example: Some(r#"{"user":{"id":1,"name":"Bo"}}"#.into()),
        ..SourcePatch::api("Source A")
    }
}

fn source_b() -> SourcePatch {
    SourcePatch {
        update_endpoint: Some("https://b/y".into()),
        update_payload: Some(r#"{"fullName":""}"#.into()),
        ..SourcePatch::api("Source B")
    }
}

fn name_to_full_name(ws: &mut Workspace) {
    let created = ws
        .create_mapping(
            &FieldRef::new(1, "user.name", FieldType::String),
            &FieldRef::new(2, "fullName", FieldType::String),
        )
        .unwrap();
    assert!(created);
}

fn scenario() -> Workspace {
    let mut ws = Workspace::open(MemoryStore::new()).unwrap();
    ws.add_source(Some(1), source_a()).unwrap();
    ws.add_source(Some(2), source_b()).unwrap();
    name_to_full_name(&mut ws);
    ws
}

fn step_blocks<'a>(code: &'a str, fetch_marker: &str, transfer_marker: &str) -> (&'a str, &'a str) {
    let fetch = code.find(fetch_marker).unwrap();
    let transfer = code.find(transfer_marker).unwrap();
    (&code[fetch..transfer], &code[transfer..])
}

// ─────────────────────── scenarios ───────────────────────

#[test]
fn extract_fields_on_response_example() {
    let ws = scenario();
    let fields = ws.source_fields(1).unwrap().response;
    assert_eq!(
        fields,
        vec![
            Field::new("user", FieldType::Object),
            Field::new("user.id", FieldType::Number),
            Field::new("user.name", FieldType::String),
        ]
    );
    let targets = ws.source_fields(2).unwrap().update;
    assert_eq!(targets, vec![Field::new("fullName", FieldType::String)]);
}

#[test]
fn simulate_copies_mapped_value() {
    let ws = scenario();
    let results = ws.simulate().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].source_name, "Source A");
    assert_eq!(results[0].target_name, "Source B");
    assert_eq!(results[0].payload, json!({"fullName": "Bo"}));
    assert_eq!(results[0].url, "https://b/y");
    assert_eq!(results[0].message, "Mapped 1 field(s)");
}

#[test]
fn simulate_with_invalid_example_omits_field() {
    let mut ws = scenario();
    ws.update_source(
        1,
        SourcePatch {
            receive_response_example: Some("{bad".into()),
            ..Default::default()
        },
    )
    .unwrap();

    let results = ws.simulate().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].payload, json!({}));
    assert!(results[0].payload.get("fullName").is_none());
}

#[test]
fn generated_code_fetches_everything_before_sending() {
    let mut ws = Workspace::open(MemoryStore::new()).unwrap();
    for (id, name) in [(1, "One"), (2, "Two"), (3, "Three")] {
        ws.add_source(
            Some(id),
            SourcePatch {
                receive_endpoint: Some(format!("https://{id}.test/in")),
                update_endpoint: Some(format!("https://{id}.test/out")),
                ..SourcePatch::api(name)
            },
        )
        .unwrap();
    }
    ws.create_mapping(
        &FieldRef::new(1, "a", FieldType::String),
        &FieldRef::new(2, "a", FieldType::String),
    )
    .unwrap();
    ws.create_mapping(
        &FieldRef::new(3, "b", FieldType::String),
        &FieldRef::new(2, "b", FieldType::String),
    )
    .unwrap();

    for file in ws.generate_all().unwrap() {
        let code = &file.content;
        let last_fetch = code.rfind("Fetching data from").unwrap();
        let first_send = code.find("Sending data to").unwrap();
        assert!(
            last_fetch < first_send,
            "{}: every fetch must precede the first send",
            file.filename
        );
        assert!(code.find("Fetching data from One").unwrap() < code.find("Fetching data from Three").unwrap());
        assert_eq!(code.matches("Sending data to Two...").count(), 2, "{}", file.filename);
    }
}

#[test]
fn python_fetch_failure_aborts_and_send_failure_continues() {
    let ws = scenario();
    let code = ws.generate(Language::Python).unwrap();
    let (fetch_block, send_block) = step_blocks(
        &code,
        "# Fetch data from Source A",
        "# Transform data from Source A to Source B",
    );

    assert_eq!(fetch_block.matches("raise RuntimeError(").count(), 2);
    assert!(!send_block.contains("raise"));
    assert!(!send_block.contains("return"));
    assert!(send_block.contains("except requests.RequestException as e:"));
}

#[test]
fn php_fetch_failure_aborts_and_send_failure_continues() {
    let ws = scenario();
    let code = ws.generate(Language::Php).unwrap();
    let (fetch_block, send_block) = step_blocks(
        &code,
        "// Fetch data from Source A",
        "// Transform data from Source A to Source B",
    );

    assert_eq!(fetch_block.matches("throw new RuntimeException(").count(), 1);
    assert!(!send_block.contains("throw"));
    assert!(!send_block.contains("return"));
    assert!(send_block.contains("echo '✗ Failed to send to Source B: ' . failure_reason($response) . PHP_EOL;"));
    assert!(send_block.contains("} catch (Throwable $e) {"));
}

#[test]
fn go_fetch_failure_aborts_and_send_failure_continues() {
    let ws = scenario();
    let code = ws.generate(Language::Go).unwrap();
    let (fetch_block, rest) = step_blocks(
        &code,
        "// Fetch data from Source A",
        "// Transform data from Source A to Source B",
    );
    let send_block = &rest[..rest.find("\treturn nil\n").unwrap()];

    assert_eq!(fetch_block.matches("return fmt.Errorf(").count(), 2);
    assert!(!send_block.contains("return"));
    assert!(send_block.contains("} else if _, status, err := httpRequest(source_b_update_method, source_b_update_url"));
    assert!(send_block.contains("} else if status < 200 || status >= 300 {"));
}

#[test]
fn source_named_like_the_record_keeps_its_data() {
    let mut ws = Workspace::open(MemoryStore::new()).unwrap();
    ws.add_source(
        Some(1),
        SourcePatch {
            update_endpoint: Some("https://sink.test/in".into()),
            ..SourcePatch::api("Sink")
        },
    )
    .unwrap();
    for (id, name) in [(2, "Transformed"), (3, "Record")] {
        ws.add_source(
            Some(id),
            SourcePatch {
                receive_endpoint: Some(format!("https://{id}.test/out")),
                ..SourcePatch::api(name)
            },
        )
        .unwrap();
    }
    ws.create_mapping(
        &FieldRef::new(2, "x", FieldType::String),
        &FieldRef::new(1, "y", FieldType::String),
    )
    .unwrap();
    ws.create_mapping(
        &FieldRef::new(3, "z", FieldType::String),
        &FieldRef::new(1, "w", FieldType::String),
    )
    .unwrap();

    let python = ws.generate(Language::Python).unwrap();
    assert_eq!(python.matches("transformed_data = ").count(), 1);
    assert_eq!(python.matches("record_data = ").count(), 1);
    assert!(python.contains("    record = {}\n"));
    assert!(python.contains("record['y'] = get_nested_value(transformed_data, 'x')"));
    assert!(python.contains("record['w'] = get_nested_value(record_data, 'z')"));

    let php = ws.generate(Language::Php).unwrap();
    assert_eq!(php.matches("$transformed_data = ").count(), 1);
    assert!(php.contains("$record['y'] = get_nested_value($transformed_data, 'x');"));

    let go = ws.generate(Language::Go).unwrap();
    assert_eq!(go.matches("transformed_data = data").count(), 1);
    assert!(go.contains("record[\"y\"] = getNestedValue(transformed_data, \"x\")"));
}

#[test]
fn inert_source_is_left_out_of_generated_code() {
    let mut ws = scenario();
    ws.add_source(Some(3), SourcePatch::api("Dormant")).unwrap();
    for file in ws.generate_all().unwrap() {
        assert!(!file.content.contains("Configuration for Dormant"), "{}", file.filename);
        assert!(!file.content.contains("dormant_"), "{}", file.filename);
    }
}

#[test]
fn colliding_names_generate_distinct_identifiers() {
    let mut ws = Workspace::open(MemoryStore::new()).unwrap();
    ws.add_source(
        Some(4),
        SourcePatch {
            receive_endpoint: Some("https://first.test".into()),
            ..SourcePatch::api("My API")
        },
    )
    .unwrap();
    ws.add_source(
        Some(7),
        SourcePatch {
            update_endpoint: Some("https://second.test".into()),
            ..SourcePatch::api("my   api")
        },
    )
    .unwrap();
    ws.create_mapping(
        &FieldRef::new(4, "x", FieldType::String),
        &FieldRef::new(7, "y", FieldType::String),
    )
    .unwrap();

    let code = ws.generate(Language::Python).unwrap();
    assert!(code.contains("my_api_4_url = 'https://first.test'"));
    assert!(code.contains("my_api_7_update_url = 'https://second.test'"));
    assert!(code.contains("get_nested_value(my_api_4_data, 'x')"));
}

#[test]
fn generation_requires_two_sources_and_a_mapping() {
    let mut ws = Workspace::open(MemoryStore::new()).unwrap();
    ws.add_source(None, source_a()).unwrap();
    assert!(ws.generate(Language::Go).unwrap_err().is_validation());
    assert!(ws.simulate().unwrap_err().is_validation());

    ws.add_source(None, source_b()).unwrap();
    assert!(ws.generate(Language::Go).unwrap_err().is_validation());
}

#[test]
fn state_survives_reopen_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut ws = Workspace::open(FileStore::open(dir.path()).unwrap()).unwrap();
        ws.add_source(Some(1), source_a()).unwrap();
        ws.add_source(Some(2), source_b()).unwrap();
        name_to_full_name(&mut ws);
    }

    let raw = std::fs::read_to_string(dir.path().join("api_integrator_sources.json")).unwrap();
    let sources: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(sources[0]["type"], "API");
    assert_eq!(sources[0]["receiveEndpoint"], "https://a/x");
    assert_eq!(sources[1]["updateMethod"], "POST");

    let mut ws = Workspace::open(FileStore::open(dir.path()).unwrap()).unwrap();
    assert_eq!(ws.sources().len(), 2);
    assert_eq!(ws.graph().mapping_count(), 1);
    assert_eq!(ws.connections().unwrap()[0].connection_id, "1->2|user.name|fullName");

    let id = ws.add_source(None, SourcePatch::api("Third")).unwrap();
    assert_eq!(id, 3);
}

#[test]
fn removing_a_source_emits_events() {
    let mut ws = scenario();
    let mut rx = ws.subscribe();
    ws.remove_source(2).unwrap();

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert!(events.contains(&WorkspaceEvent::SourcesChanged { source_count: 1 }));
    assert!(events.contains(&WorkspaceEvent::SourceRemoved {
        source_id: 2,
        buckets_removed: 1
    }));
    assert!(events.contains(&WorkspaceEvent::MappingsChanged {
        bucket_count: 0,
        mapping_count: 0
    }));
}
