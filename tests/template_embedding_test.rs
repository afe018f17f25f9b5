use hdl_share::templates::{default_listing_template, get_error_description, render_error_page, Template};

/// The built-in templates are embedded in the binary and render without filesystem access.
#[test]
fn test_embedded_templates_functionality() {
    let listing = default_listing_template().expect("default listing template is embedded");
    let template = Template::new(String::from_utf8(listing.into_owned()).unwrap());

    let html = template.render(&[
        ("path", "/test/path".to_string()),
        ("files", "<li>test file</li>".to_string()),
        ("hosted_directory", "Files".to_string()),
    ]);
    assert!(html.contains("/test/path"), "Should contain the path variable");
    assert!(html.contains("<li>test file</li>"), "Should contain the entries");
    assert!(!html.contains("{{ "), "Every placeholder should be substituted");
    assert!(
        html.contains("enctype=\"multipart/form-data\""),
        "Should offer the upload form"
    );

    let error_html = render_error_page(413, "Payload Too Large", get_error_description(413)).unwrap();
    assert!(error_html.contains("413"), "Should contain the status code");
    assert!(error_html.contains("Payload Too Large"), "Should contain the status text");
    assert!(!error_html.contains("{{ "), "Every placeholder should be substituted");
}
