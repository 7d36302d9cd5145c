//! PHP dialect: cURL based, configuration as globals.

use super::plan::{Assignment, EndpointConfig, FetchStep, IntegrationPlan, SourceConfig, TransferStep};
use super::{comment_text, Dialect};

pub struct Php;

/// Quote a string as a single-quoted PHP literal.
pub fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn array(pairs: &[(String, String)]) -> String {
    let entries: Vec<String> = pairs
        .iter()
        .map(|(k, v)| format!("{} => {}", quote(k), quote(v)))
        .collect();
    format!("[{}]", entries.join(", "))
}

fn endpoint(out: &mut String, prefix: &str, endpoint: &EndpointConfig) {
    out.push_str(&format!("${prefix}_url = {};\n", quote(&endpoint.url)));
    out.push_str(&format!("${prefix}_method = {};\n", quote(endpoint.method)));
    out.push_str(&format!("${prefix}_headers = {};\n", array(&endpoint.headers)));
    if let Some(body) = &endpoint.body {
        out.push_str(&format!("${prefix}_body = {};\n", quote(&body.to_string())));
    }
}

fn endpoint_globals(prefix: &str, endpoint: &EndpointConfig) -> Vec<String> {
    let mut vars = vec![
        format!("${prefix}_url"),
        format!("${prefix}_method"),
        format!("${prefix}_headers"),
    ];
    if endpoint.body.is_some() {
        vars.push(format!("${prefix}_body"));
    }
    vars
}

fn echo(message: &str) -> String {
    format!("echo {} . PHP_EOL;\n", quote(message))
}

/// Comment-safe source name. `?>` would leave PHP mode even inside `//`.
fn comment(name: &str) -> String {
    comment_text(name).replace("?>", "? >")
}

impl Dialect for Php {
    fn prologue(&self, out: &mut String) {
        out.push_str("<?php\n");
        out.push_str("// Auto-generated API Integration Code - PHP\n\n");
    }

    fn config_block(&self, out: &mut String, config: &SourceConfig) {
        out.push_str(&format!("// Configuration for {}\n", comment(&config.name)));
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
            r#"// Helper function to get nested values
function get_nested_value($data, $path) {
    $value = $data;
    foreach (explode('.', $path) as $key) {
        if (is_array($value) && array_key_exists($key, $value)) {
            $value = $value[$key];
        } else {
            return null;
        }
    }
    return $value;
}

// Helper function to perform an HTTP request with a JSON body
function http_request($method, $url, $headers = [], $body = null) {
    $lines = [];
    foreach ($headers as $name => $value) {
        $lines[] = $name . ': ' . $value;
    }
    $ch = curl_init($url);
    curl_setopt($ch, CURLOPT_RETURNTRANSFER, true);
    curl_setopt($ch, CURLOPT_CUSTOMREQUEST, $method);
    if ($body !== null) {
        $lines[] = 'Content-Type: application/json';
        curl_setopt($ch, CURLOPT_POSTFIELDS, $body);
    }
    curl_setopt($ch, CURLOPT_HTTPHEADER, $lines);
    $response = curl_exec($ch);
    $error = $response === false ? curl_error($ch) : '';
    $code = curl_getinfo($ch, CURLINFO_HTTP_CODE);
    curl_close($ch);
    return [
        'code' => $code,
        'data' => $response === false ? null : json_decode($response, true),
        'error' => $error,
    ];
}

// Describe a failed request
function failure_reason($response) {
    return $response['error'] !== '' ? $response['error'] : (string) $response['code'];
}

"#,
        );
    }

    fn begin_run(&self, out: &mut String, plan: &IntegrationPlan) {
        out.push_str("// Main integration function\n");
        out.push_str("function integrate() {\n");
        let globals: Vec<String> = plan
            .configs
            .iter()
            .flat_map(|c| {
                let mut vars = Vec::new();
                if let Some(receive) = &c.receive {
                    vars.extend(endpoint_globals(&c.ident, receive));
                }
                if let Some(update) = &c.update {
                    vars.extend(endpoint_globals(&format!("{}_update", c.ident), update));
                }
                vars
            })
            .collect();
        if !globals.is_empty() {
            out.push_str(&format!("    global {};\n", globals.join(", ")));
        }
    }

    fn fetch(&self, out: &mut String, step: &FetchStep) {
        let v = &step.ident;
        let body = if step.has_body {
            format!("${v}_body")
        } else {
            "null".to_string()
        };
        out.push_str(&format!("\n    // Fetch data from {}\n", comment(&step.name)));
        out.push_str(&format!("    {}", echo(&format!("Fetching data from {}...", step.name))));
        out.push_str(&format!(
            "    $response = http_request(${v}_method, ${v}_url, ${v}_headers, {body});\n"
        ));
        out.push_str("    if ($response['code'] >= 200 && $response['code'] < 300) {\n");
        out.push_str(&format!("        ${v}_data = $response['data'];\n"));
        out.push_str(&format!(
            "        {}",
            echo(&format!("✓ Successfully received data from {}", step.name))
        ));
        out.push_str("    } else {\n");
        out.push_str(&format!(
            "        throw new RuntimeException({} . failure_reason($response));\n",
            quote(&format!("failed to fetch from {}: ", step.name))
        ));
        out.push_str("    }\n");
    }

    fn begin_transfer(&self, out: &mut String, step: &TransferStep) {
        out.push_str(&format!(
            "\n    // Transform data from {} to {}\n",
            comment(&step.source_name),
            comment(&step.target_name)
        ));
        out.push_str(&format!(
            "    {}",
            echo(&format!(
                "Transforming data from {} to {}...",
                step.source_name, step.target_name
            ))
        ));
        out.push_str("    $record = [];\n");
    }

    fn assign(&self, out: &mut String, step: &TransferStep, assignment: &Assignment) {
        out.push_str(&format!(
            "    $record[{}] = get_nested_value(${}_data, {});\n",
            quote(&assignment.target_field),
            step.source_ident,
            quote(&assignment.source_field)
        ));
    }

    fn send(&self, out: &mut String, step: &TransferStep) {
        let t = format!("{}_update", step.target_ident);
        out.push_str(&format!("    {}", echo(&format!("Sending data to {}...", step.target_name))));
        out.push_str(&format!(
            "    $response = http_request(${t}_method, ${t}_url, ${t}_headers, json_encode($record));\n"
        ));
        out.push_str("    if ($response['code'] >= 200 && $response['code'] < 300) {\n");
        out.push_str(&format!(
            "        {}",
            echo(&format!("✓ Successfully sent data to {}", step.target_name))
        ));
        out.push_str("    } else {\n");
        out.push_str(&format!(
            "        echo {} . failure_reason($response) . PHP_EOL;\n",
            quote(&format!("✗ Failed to send to {}: ", step.target_name))
        ));
        out.push_str("    }\n");
    }

    fn unsendable(&self, out: &mut String, step: &TransferStep) {
        out.push_str(&format!(
            "    {}",
            echo(&format!(
                "✗ Failed to send to {}: no update endpoint configured",
                step.target_name
            ))
        ));
    }

    fn end_transfer(&self, _out: &mut String, _step: &TransferStep) {}

    fn end_run(&self, out: &mut String) {
        out.push_str("}\n\n");
        out.push_str("try {\n");
        out.push_str("    integrate();\n");
        out.push_str("    echo PHP_EOL . '✓ Integration complete!' . PHP_EOL;\n");
        out.push_str("} catch (Throwable $e) {\n");
        out.push_str("    echo PHP_EOL . '✗ Error: ' . $e->getMessage() . PHP_EOL;\n");
        out.push_str("}\n");
    }
}
