// Snapshot builders shared by the reconcile benches. Each bench target
// compiles this module on its own, so unused helpers are allowed.
#[allow(dead_code)]
pub fn generate_document(sections: usize) -> String {
    let mut out = String::from("<doc><body>");
    for section in 0..sections {
        out.push_str(&section_xml(section, "Paragraph with some content."));
    }
    out.push_str("<p></p></body></doc>");
    out
}

/// Same shape as [`generate_document`] with every third section edited.
#[allow(dead_code)]
pub fn generate_edited_document(sections: usize) -> String {
    let mut out = String::from("<doc><body>");
    for section in 0..sections {
        let body = if section % 3 == 0 {
            "Paragraph with <b>different</b> content and more of it."
        } else {
            "Paragraph with some content."
        };
        out.push_str(&section_xml(section, body));
    }
    out.push_str("<p></p></body></doc>");
    out
}

fn section_xml(section: usize, body: &str) -> String {
    format!(
        "<h1>Section {section}</h1><p>{body}</p>\
         <li>Bullet point</li><li level=\"1\">Nested item</li>\
         <table><tr><td>k{section}</td><td>v</td></tr><tr><td>a</td><td>b</td></tr></table>\
         <p>After the table.</p>"
    )
}
