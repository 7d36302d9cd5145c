//! Go dialect: `net/http` based, errors returned from `integrate`.
//!
//! Fetched data lives in package-level variables so a source that is fetched
//! but never read still compiles.

use super::plan::{Assignment, EndpointConfig, FetchStep, IntegrationPlan, SourceConfig, TransferStep};
use super::{comment_text as comment, Dialect};

pub struct Go;

/// Quote a string as an interpreted Go literal.
///
/// JSON string escaping is a subset of Go's escape syntax.
pub fn quote(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

fn headers(pairs: &[(String, String)]) -> String {
    if pairs.is_empty() {
        return "map[string]string{}".to_string();
    }
    let mut out = String::from("map[string]string{\n");
    for (k, v) in pairs {
        out.push_str(&format!("\t\t{}: {},\n", quote(k), quote(v)));
    }
    out.push_str("\t}");
    out
}

fn endpoint(out: &mut String, prefix: &str, endpoint: &EndpointConfig) {
    out.push_str(&format!("\t{prefix}_url = {}\n", quote(&endpoint.url)));
    out.push_str(&format!("\t{prefix}_method = {}\n", quote(endpoint.method)));
    out.push_str(&format!("\t{prefix}_headers = {}\n", headers(&endpoint.headers)));
    if let Some(body) = &endpoint.body {
        out.push_str(&format!("\t{prefix}_body = {}\n", quote(&body.to_string())));
    }
}

impl Dialect for Go {
    fn prologue(&self, out: &mut String) {
        out.push_str("// Auto-generated API Integration Code - Go\n");
        out.push_str("package main\n\n");
        out.push_str("import (\n");
        for pkg in ["bytes", "encoding/json", "fmt", "io", "net/http", "strings"] {
            out.push_str(&format!("\t\"{pkg}\"\n"));
        }
        out.push_str(")\n\n");
    }

    fn config_block(&self, out: &mut String, config: &SourceConfig) {
        out.push_str(&format!("// Configuration for {}\n", comment(&config.name)));
        out.push_str("var (\n");
        if let Some(receive) = &config.receive {
            endpoint(out, &config.ident, receive);
        }
        if let Some(update) = &config.update {
            endpoint(out, &format!("{}_update", config.ident), update);
        }
        out.push_str(")\n\n");
    }

    fn helpers(&self, out: &mut String) {
        out.push_str(
            r#"// getNestedValue walks a dot-separated path through decoded JSON objects.
func getNestedValue(data map[string]interface{}, path string) interface{} {
	var value interface{} = data
	for _, key := range strings.Split(path, ".") {
		m, ok := value.(map[string]interface{})
		if !ok {
			return nil
		}
		value, ok = m[key]
		if !ok {
			return nil
		}
	}
	return value
}

// httpRequest sends one request and decodes a JSON object response.
func httpRequest(method, url string, headers map[string]string, body []byte) (map[string]interface{}, int, error) {
	var reader io.Reader
	if body != nil {
		reader = bytes.NewReader(body)
	}
	req, err := http.NewRequest(method, url, reader)
	if err != nil {
		return nil, 0, err
	}
	if body != nil {
		req.Header.Set("Content-Type", "application/json")
	}
	for key, value := range headers {
		req.Header.Set(key, value)
	}
	resp, err := http.DefaultClient.Do(req)
	if err != nil {
		return nil, 0, err
	}
	defer resp.Body.Close()
	raw, err := io.ReadAll(resp.Body)
	if err != nil {
		return nil, resp.StatusCode, err
	}
	var result map[string]interface{}
	_ = json.Unmarshal(raw, &result)
	return result, resp.StatusCode, nil
}

"#,
        );
    }

    fn begin_run(&self, out: &mut String, plan: &IntegrationPlan) {
        if !plan.fetches.is_empty() {
            out.push_str("// Fetched source data\n");
            out.push_str("var (\n");
            for step in &plan.fetches {
                out.push_str(&format!("\t{}_data map[string]interface{{}}\n", step.ident));
            }
            out.push_str(")\n\n");
        }
        out.push_str("// integrate fetches every source, then sends each mapped record to its target.\n");
        out.push_str("func integrate() error {\n");
    }

    fn fetch(&self, out: &mut String, step: &FetchStep) {
        let v = &step.ident;
        let body = if step.has_body {
            format!("[]byte({v}_body)")
        } else {
            "nil".to_string()
        };
        out.push_str(&format!("\t// Fetch data from {}\n", comment(&step.name)));
        out.push_str(&format!(
            "\tfmt.Println({})\n",
            quote(&format!("Fetching data from {}...", step.name))
        ));
        out.push_str("\t{\n");
        out.push_str(&format!(
            "\t\tdata, status, err := httpRequest({v}_method, {v}_url, {v}_headers, {body})\n"
        ));
        out.push_str("\t\tif err != nil {\n");
        out.push_str(&format!(
            "\t\t\treturn fmt.Errorf(\"%s: %w\", {}, err)\n",
            quote(&format!("failed to fetch from {}", step.name))
        ));
        out.push_str("\t\t}\n");
        out.push_str("\t\tif status < 200 || status >= 300 {\n");
        out.push_str(&format!(
            "\t\t\treturn fmt.Errorf(\"%s: status %d\", {}, status)\n",
            quote(&format!("failed to fetch from {}", step.name))
        ));
        out.push_str("\t\t}\n");
        out.push_str(&format!("\t\t{v}_data = data\n"));
        out.push_str(&format!(
            "\t\tfmt.Println({})\n",
            quote(&format!("✓ Successfully received data from {}", step.name))
        ));
        out.push_str("\t}\n\n");
    }

    fn begin_transfer(&self, out: &mut String, step: &TransferStep) {
        out.push_str(&format!(
            "\t// Transform data from {} to {}\n",
            comment(&step.source_name),
            comment(&step.target_name)
        ));
        out.push_str("\t{\n");
        out.push_str(&format!(
            "\t\tfmt.Println({})\n",
            quote(&format!(
                "Transforming data from {} to {}...",
                step.source_name, step.target_name
            ))
        ));
        out.push_str("\t\trecord := map[string]interface{}{}\n");
    }

    fn assign(&self, out: &mut String, step: &TransferStep, assignment: &Assignment) {
        out.push_str(&format!(
            "\t\trecord[{}] = getNestedValue({}_data, {})\n",
            quote(&assignment.target_field),
            step.source_ident,
            quote(&assignment.source_field)
        ));
    }

    fn send(&self, out: &mut String, step: &TransferStep) {
        let t = format!("{}_update", step.target_ident);
        let failed = quote(&format!("✗ Failed to send to {}:", step.target_name));
        out.push_str(&format!(
            "\t\tfmt.Println({})\n",
            quote(&format!("Sending data to {}...", step.target_name))
        ));
        out.push_str("\t\tpayload, err := json.Marshal(record)\n");
        out.push_str("\t\tif err != nil {\n");
        out.push_str(&format!("\t\t\tfmt.Println({failed}, err)\n"));
        out.push_str(&format!(
            "\t\t}} else if _, status, err := httpRequest({t}_method, {t}_url, {t}_headers, payload); err != nil {{\n"
        ));
        out.push_str(&format!("\t\t\tfmt.Println({failed}, err)\n"));
        out.push_str("\t\t} else if status < 200 || status >= 300 {\n");
        out.push_str(&format!("\t\t\tfmt.Println({failed}, status)\n"));
        out.push_str("\t\t} else {\n");
        out.push_str(&format!(
            "\t\t\tfmt.Println({})\n",
            quote(&format!("✓ Successfully sent data to {}", step.target_name))
        ));
        out.push_str("\t\t}\n");
    }

    fn unsendable(&self, out: &mut String, step: &TransferStep) {
        out.push_str("\t\t_ = record\n");
        out.push_str(&format!(
            "\t\tfmt.Println({})\n",
            quote(&format!(
                "✗ Failed to send to {}: no update endpoint configured",
                step.target_name
            ))
        ));
    }

    fn end_transfer(&self, out: &mut String, _step: &TransferStep) {
        out.push_str("\t}\n\n");
    }

    fn end_run(&self, out: &mut String) {
        out.push_str("\treturn nil\n");
        out.push_str("}\n\n");
        out.push_str(
            r#"func main() {
	defer func() {
		if r := recover(); r != nil {
			fmt.Printf("\n✗ Error: %v\n", r)
		}
	}()
	if err := integrate(); err != nil {
		fmt.Printf("\n✗ Error: %v\n", err)
		return
	}
	fmt.Println("\n✓ Integration complete!")
}
"#,
        );
    }
}
