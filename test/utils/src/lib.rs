/// Renders fragments as `data:` frames separated by blank lines, terminated
/// by `[DONE]`.
pub fn sse_body(fragments: &[&str]) -> String {
    let mut body = fragments
        .iter()
        .map(|fragment| {
            return format!("data:{fragment}\n\n");
        })
        .collect::<Vec<String>>()
        .join("");

    body += "data:[DONE]\n\n";
    return body;
}

pub fn sse_fixture() -> &'static str {
    return r#": keep-alive comment frame

data:Hello

data: there

event: message
data:multi
data:line

data:[DONE]

data:never delivered

"#;
}

pub fn persisted_fixture() -> &'static str {
    return r#"[
  {"id":"a1B2c3D4e5F6","role":"assistant","content":"Hi! I'm here whenever you have a question.","ts":1700000000000},
  {"id":"g7H8i9J0k1L2","role":"user","content":"What is Rust?","ts":1700000005000},
  {"id":"m3N4o5P6q7R8","role":"assistant","content":"A systems programming language.","ts":1700000006000}
]"#;
}
