//! Python dialect: `requests` based, single-quoted literals.

use super::plan::{Assignment, EndpointConfig, FetchStep, IntegrationPlan, SourceConfig, TransferStep};
use super::{comment_text as comment, Dialect};

pub struct Python;

/// Quote a string as a single-quoted Python literal.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

fn dict(pairs: &[(String, String)]) -> String {
    let entries: Vec<String> = pairs
        .iter()
        .map(|(k, v)| format!("{}: {}", quote(k), quote(v)))
        .collect();
    format!("{{{}}}", entries.join(", "))
}

fn endpoint(out: &mut String, prefix: &str, endpoint: &EndpointConfig) {
    out.push_str(&format!("{prefix}_url = {}\n", quote(&endpoint.url)));
    out.push_str(&format!("{prefix}_method = {}\n", quote(endpoint.method)));
    out.push_str(&format!("{prefix}_headers = {}\n", dict(&endpoint.headers)));
    if let Some(body) = &endpoint.body {
        out.push_str(&format!("{prefix}_body = json.loads({})\n", quote(&body.to_string())));
    }
}

impl Dialect for Python {
    fn prologue(&self, out: &mut String) {
        out.push_str("# Auto-generated API Integration Code - Python\n");
        out.push_str("import json\n");
        out.push_str("import requests\n\n");
    }

    fn config_block(&self, out: &mut String, config: &SourceConfig) {
        out.push_str(&format!("# Configuration for {}\n", comment(&config.name)));
        if let Some(receive) = &config.receive {
            endpoint(out, &config.ident, receive);
        }
        if let Some(update) = &config.update {
            endpoint(out, &format!("{}_update", config.ident), update);
        }
        out.push('\n');
    }

    fn helpers(&self, out: &mut String) {
        out.push_str(
            "# Helper function to get nested values\n\
             def get_nested_value(data, path):\n\
             \x20   value = data\n\
             \x20   for key in path.split('.'):\n\
             \x20       if isinstance(value, dict) and key in value:\n\
             \x20           value = value[key]\n\
             \x20       else:\n\
             \x20           return None\n\
             \x20   return value\n\n",
        );
    }

    fn begin_run(&self, out: &mut String, _plan: &IntegrationPlan) {
        out.push_str("# Main integration function\n");
        out.push_str("def integrate():\n");
        out.push_str("    \"\"\"Fetch every source, then send each mapped record to its target.\"\"\"\n");
    }

    fn fetch(&self, out: &mut String, step: &FetchStep) {
        let v = &step.ident;
        let body = if step.has_body {
            format!(", json={v}_body")
        } else {
            String::new()
        };
        out.push_str(&format!("\n    # Fetch data from {}\n", comment(&step.name)));
        out.push_str(&format!(
            "    print({})\n",
            quote(&format!("Fetching data from {}...", step.name))
        ));
        out.push_str("    try:\n");
        out.push_str(&format!(
            "        response = requests.request(method={v}_method, url={v}_url, headers={v}_headers{body})\n"
        ));
        let failed = quote(&format!("failed to fetch from {}: ", step.name));
        out.push_str("    except requests.RequestException as e:\n");
        out.push_str(&format!("        raise RuntimeError({failed} + str(e)) from e\n"));
        out.push_str("    if not 200 <= response.status_code < 300:\n");
        out.push_str(&format!(
            "        raise RuntimeError({failed} + 'status ' + str(response.status_code))\n"
        ));
        out.push_str(&format!("    {v}_data = response.json()\n"));
        out.push_str(&format!(
            "    print({})\n",
            quote(&format!("✓ Successfully received data from {}", step.name))
        ));
    }

    fn begin_transfer(&self, out: &mut String, step: &TransferStep) {
        out.push_str(&format!(
            "\n    # Transform data from {} to {}\n",
            comment(&step.source_name),
            comment(&step.target_name)
        ));
        out.push_str(&format!(
            "    print({})\n",
            quote(&format!(
                "Transforming data from {} to {}...",
                step.source_name, step.target_name
            ))
        ));
        out.push_str("    record = {}\n");
    }

    fn assign(&self, out: &mut String, step: &TransferStep, assignment: &Assignment) {
        out.push_str(&format!(
            "    record[{}] = get_nested_value({}_data, {})\n",
            quote(&assignment.target_field),
            step.source_ident,
            quote(&assignment.source_field)
        ));
    }

    fn send(&self, out: &mut String, step: &TransferStep) {
        let t = format!("{}_update", step.target_ident);
        out.push_str(&format!(
            "    print({})\n",
            quote(&format!("Sending data to {}...", step.target_name))
        ));
        out.push_str("    try:\n");
        out.push_str(&format!(
            "        response = requests.request(method={t}_method, url={t}_url, headers={t}_headers, json=record)\n"
        ));
        out.push_str("        if 200 <= response.status_code < 300:\n");
        out.push_str(&format!(
            "            print({})\n",
            quote(&format!("✓ Successfully sent data to {}", step.target_name))
        ));
        out.push_str("        else:\n");
        out.push_str(&format!(
            "            print({}, response.status_code)\n",
            quote(&format!("✗ Failed to send to {}:", step.target_name))
        ));
        out.push_str("    except requests.RequestException as e:\n");
        out.push_str(&format!(
            "        print({}, e)\n",
            quote(&format!("✗ Failed to send to {}:", step.target_name))
        ));
    }

    fn unsendable(&self, out: &mut String, step: &TransferStep) {
        out.push_str(&format!(
            "    print({})\n",
            quote(&format!(
                "✗ Failed to send to {}: no update endpoint configured",
                step.target_name
            ))
        ));
    }

    fn end_transfer(&self, _out: &mut String, _step: &TransferStep) {}

    fn end_run(&self, out: &mut String) {
        out.push_str("\n\nif __name__ == '__main__':\n");
        out.push_str("    try:\n");
        out.push_str("        integrate()\n");
        out.push_str("        print('\\n✓ Integration complete!')\n");
        out.push_str("    except Exception as e:\n");
        out.push_str("        print('\\n✗ Error:', e)\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::{generate, Language};
    use crate::graph::MappingGraph;
    use crate::registry::SourceRegistry;
    use crate::types::{FieldRef, FieldType, ReceiveMethod, SourcePatch, UpdateMethod};

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote("plain"), "'plain'");
        assert_eq!(quote("it's"), "'it\\'s'");
        assert_eq!(quote("a\\b"), "'a\\\\b'");
        assert_eq!(quote("line\nbreak"), "'line\\nbreak'");
    }

    #[test]
    fn test_python_program_shape() {
        let mut registry = SourceRegistry::new();
        registry
            .add(
                Some(1),
                SourcePatch {
                    receive_endpoint: Some("https://crm.test/users".into()),
                    receive_method: Some(ReceiveMethod::Post),
                    receive_payload: Some(r#"{"page": 1}"#.into()),
                    receive_headers: Some(r#"{"Authorization": "Bearer t"}"#.into()),
                    ..SourcePatch::api("CRM")
                },
            )
            .unwrap();
        registry
            .add(
                Some(2),
                SourcePatch {
                    update_endpoint: Some("https://shop.test/customers".into()),
                    update_method: Some(UpdateMethod::Put),
                    ..SourcePatch::api("Shop's API")
                },
            )
            .unwrap();
        let mut graph = MappingGraph::new();
        graph.create_mapping(
            &FieldRef::new(1, "user.email", FieldType::String),
            &FieldRef::new(2, "email", FieldType::String),
        );

        let code = generate(&registry, &graph, Language::Python).unwrap();
        assert!(code.starts_with("# Auto-generated API Integration Code - Python\n"));
        assert!(code.contains("crm_url = 'https://crm.test/users'"));
        assert!(code.contains("crm_method = 'POST'"));
        assert!(code.contains("crm_headers = {'Authorization': 'Bearer t'}"));
        assert!(code.contains("crm_body = json.loads('{\"page\":1}')"));
        assert!(code.contains("shop_s_api_update_method = 'PUT'"));
        assert!(code.contains("json=crm_body"));
        assert!(code.contains(
            "record['email'] = get_nested_value(crm_data, 'user.email')"
        ));
        assert!(code.contains("print('Sending data to Shop\\'s API...')"));
        assert!(code.contains("if __name__ == '__main__':"));
    }

    fn pair(first: &str, second: &str) -> (SourceRegistry, MappingGraph) {
        let mut registry = SourceRegistry::new();
        registry
            .add(
                Some(1),
                SourcePatch {
                    receive_endpoint: Some("https://a.test/in".into()),
                    ..SourcePatch::api(first)
                },
            )
            .unwrap();
        registry
            .add(
                Some(2),
                SourcePatch {
                    update_endpoint: Some("https://b.test/out".into()),
                    ..SourcePatch::api(second)
                },
            )
            .unwrap();
        let mut graph = MappingGraph::new();
        graph.create_mapping(
            &FieldRef::new(1, "x", FieldType::String),
            &FieldRef::new(2, "y", FieldType::String),
        );
        (registry, graph)
    }

    #[test]
    fn test_fetch_failure_raises_to_entry_point() {
        let (registry, graph) = pair("Alpha", "Beta");
        let code = generate(&registry, &graph, Language::Python).unwrap();
        assert!(code.contains(
            "        raise RuntimeError('failed to fetch from Alpha: ' + str(e)) from e\n"
        ));
        assert!(code.contains("    if not 200 <= response.status_code < 300:\n"));
        assert!(code.contains("    alpha_data = response.json()\n"));

        let entry = &code[code.find("if __name__ == '__main__':").unwrap()..];
        assert!(entry.contains("except Exception as e:"));
        assert!(entry.contains("print('\\n✗ Error:', e)"));
    }

    #[test]
    fn test_carriage_return_stays_inside_comment() {
        let (registry, graph) = pair("Alpha\rimport os", "Beta");
        let code = generate(&registry, &graph, Language::Python).unwrap();
        assert!(!code.contains('\r'));
        assert!(code.contains("# Configuration for Alpha import os\n"));
        assert!(code.contains("# Fetch data from Alpha import os\n"));
        assert!(code.contains("print('Fetching data from Alpha\\rimport os...')"));
    }
}
