use tower_lsp_server::lsp_types::Position;

/// Split a fixture containing a single `$0` cursor marker into the document
/// content and the marker's position.
pub fn parse_fixture(fixture: &str) -> (String, Position) {
    let mut content = String::new();
    let mut position = Position::default();
    let mut found = false;

    for (line_num, line) in fixture.lines().enumerate() {
        if let Some(col) = line.find("$0") {
            if found {
                panic!("fixture must contain exactly one $0 cursor marker");
            }
            position.line = u32::try_from(line_num).unwrap();
            position.character = u32::try_from(col).unwrap();
            content.push_str(&line.replace("$0", ""));
            found = true;
        } else {
            content.push_str(line);
        }
        content.push('\n');
    }

    if !found {
        panic!("fixture must contain a $0 cursor marker");
    }

    (content, position)
}
