use docs_reconcile_engine::indexing::invariants;
use docs_reconcile_engine::model::{Block, Color, NamedStyle, TextStyle};
use docs_reconcile_engine::ops::{InsertTable, InsertText, Operation, Route};
use docs_reconcile_engine::snapshot::blocks_to_xml;
use docs_reconcile_engine::{
    DiffOptions, ValidationError, apply, diff, generate, parse, to_structural_xml,
};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn operations(old: &str, new: &str) -> Vec<Operation> {
    let pristine = parse(old).unwrap();
    let current = parse(new).unwrap();
    let options = DiffOptions::default();
    let tree = diff(&pristine, &current, &options).unwrap();
    let ops = generate(&tree, &options).unwrap();
    let applied = apply(&pristine, &ops).unwrap();
    assert_eq!(to_structural_xml(&applied), to_structural_xml(&current));
    ops
}

fn position(ops: &[Operation], pred: impl Fn(&Operation) -> bool) -> Vec<usize> {
    ops.iter()
        .enumerate()
        .filter(|(_, op)| pred(op))
        .map(|(i, _)| i)
        .collect()
}

#[test]
fn word_replacement_inside_a_paragraph() {
    let ops = operations("<p>Hello World</p>", "<p>Hello Universe</p>");

    assert!(ops.iter().any(|op| op.name() == "deleteContentRange"));
    let inserted: String = ops
        .iter()
        .filter_map(|op| match op {
            Operation::InsertText(i) => Some(i.text.as_str()),
            _ => None,
        })
        .collect();
    assert!(inserted.contains("Unive"), "inserted {inserted:?}");
    assert!(!ops.iter().any(|op| op.name() == "insertTable"));
}

#[test]
fn cell_edit_precedes_the_row_deletion() {
    let ops = operations(
        "<table><tr><td>alpha</td></tr><tr><td>beta</td></tr><tr><td>gamma</td></tr></table><p></p>",
        "<table><tr><td>alpha</td></tr><tr><td>gamut</td></tr></table><p></p>",
    );

    let text_edits = position(&ops, |op| {
        matches!(op, Operation::InsertText(_) | Operation::DeleteContentRange(_))
    });
    let row_deletes = position(&ops, |op| op.name() == "deleteTableRow");
    assert_eq!(row_deletes.len(), 1);
    assert!(!text_edits.is_empty());
    assert!(text_edits.iter().all(|&i| i < row_deletes[0]));
}

#[rstest]
#[case::rows(
    "<table><tr><td>a</td><td>b</td></tr><tr><td>c</td><td>d</td></tr><tr><td>e</td><td>f</td></tr></table><p></p>",
    "<table><tr><td>a</td><td>B</td></tr><tr><td>e</td><td>f!</td></tr></table><p></p>"
)]
#[case::columns(
    "<table><tr><td>a</td><td>b</td><td>c</td></tr><tr><td>d</td><td>e</td><td>f</td></tr></table><p></p>",
    "<table><tr><td>a</td><td>c!</td></tr><tr><td>d</td><td>f</td></tr></table><p></p>"
)]
fn structural_deletes_come_last(#[case] old: &str, #[case] new: &str) {
    let ops = operations(old, new);

    let structural = position(&ops, Operation::is_structural_table_delete);
    let edits = position(&ops, |op| !op.is_structural_table_delete());
    assert!(!structural.is_empty());
    assert!(edits.iter().all(|e| structural.iter().all(|s| e < s)));
}

#[test]
fn deleting_a_middle_paragraph_is_one_range() {
    let ops = operations(
        "<p>First</p><p>Second</p><p>Third</p>",
        "<p>First</p><p>Third</p>",
    );

    // "First\n" 1..7, "Second\n" 7..14
    assert_eq!(ops.len(), 1);
    let Operation::DeleteContentRange(delete) = &ops[0] else {
        panic!("expected a deletion, got {:?}", ops[0]);
    };
    assert_eq!((delete.range.start_index, delete.range.end_index), (6, 13));
}

#[rstest]
#[case::spacer_before_a_heading(
    "<p>Intro</p><p></p><h2>Old section</h2><p>Body</p>",
    "<p>Intro</p><p></p><p>Body</p>"
)]
#[case::spacer_before_a_trailing_heading("<p>Intro</p><p></p><h2>Old</h2>", "<p>Intro</p><p></p>")]
#[case::spacer_before_a_bullet(
    r#"<p>Intro</p><p></p><li type="bullet">item</li><p>Body</p>"#,
    "<p>Intro</p><p></p><p>Body</p>"
)]
#[case::empty_heading_after_a_spacer("<p></p><h1></h1>", "<p></p>")]
#[case::bullet_after_an_empty_heading(
    r#"<h1></h1><li type="bullet">the quick fox</li>"#,
    "<h1></h1>"
)]
#[case::empty_list_item_reshaped(
    r#"<li type="number" level="1"></li><h1>Plan</h1>"#,
    r#"<p>x 😀</p><li type="bullet"></li>"#
)]
#[case::empty_item_dropped_as_the_heading_becomes_one(
    r#"<p>Intro</p><li type="number"></li><h2>Old</h2>"#,
    r#"<p>Intro</p><li type="number">filled</li>"#
)]
#[case::text_before_the_deleted_tail("<p>Intro</p><p>Old</p><p>older</p>", "<p>Intro</p>")]
fn deleting_after_an_empty_paragraph_keeps_its_style(#[case] old: &str, #[case] new: &str) {
    operations(old, new);
}

#[test]
fn table_under_an_empty_heading_takes_its_text_style() {
    let doc = parse("<h6></h6><p>x</p>").unwrap();
    let ops = [Operation::InsertTable(InsertTable {
        rows: 1,
        columns: 2,
        location: Route::default().location(1),
    })];
    let applied = apply(&doc, &ops).unwrap();

    let blocks = &applied.tabs[0].body.blocks;
    let Block::Table(table) = &blocks[1] else {
        panic!("expected the table after the split heading");
    };
    for cell in &table.rows[0].cells {
        let Some(Block::Paragraph(p)) = cell.content.first() else {
            panic!("expected a paragraph in every cell");
        };
        // foreground never survives on a terminator
        let style = p.terminator_style().unwrap();
        assert!(style.italic);
        assert_eq!(style.foreground, None);
    }
    assert_eq!(
        blocks_to_xml(blocks),
        "<h6></h6><table><tr><td><p></p></td><td><p></p></td></tr></table><h6></h6><p>x</p>"
    );
}

#[test]
fn table_under_a_heading_with_text_stays_plain() {
    // "Notes\n" is 1..7
    let doc = parse("<h6>Notes</h6><p>x</p>").unwrap();
    let ops = [Operation::InsertTable(InsertTable {
        rows: 1,
        columns: 1,
        location: Route::default().location(6),
    })];
    let applied = apply(&doc, &ops).unwrap();

    let Block::Table(table) = &applied.tabs[0].body.blocks[1] else {
        panic!("expected the table after the split heading");
    };
    let Some(Block::Paragraph(p)) = table.rows[0].cells[0].content.first() else {
        panic!("expected a paragraph in the cell");
    };
    assert_eq!(p.terminator_style(), Some(&TextStyle::default()));
}

#[test]
fn heading_text_styles_follow_the_named_style() {
    let grey = Some(Color([0x66, 0x66, 0x66]));
    assert_eq!(NamedStyle::Heading1.text_style(), TextStyle::default());
    assert_eq!(NamedStyle::Heading4.text_style().foreground, grey);
    assert!(NamedStyle::Heading6.text_style().italic);
}

#[test]
fn newline_at_a_link_boundary_leaves_an_unlinked_terminator() {
    let doc = parse(r##"<p>see <a href="https://e.x"><span color="#1155cc">docs</span></a></p>"##)
        .unwrap();
    let ops = [Operation::InsertText(InsertText {
        text: "\n".into(),
        location: Route::default().location(9),
    })];
    let applied = apply(&doc, &ops).unwrap();

    let blocks = &applied.tabs[0].body.blocks;
    assert_eq!(blocks.len(), 2);
    for block in blocks {
        let Block::Paragraph(p) = block else {
            panic!("expected paragraphs only");
        };
        let terminator = p.terminator_style().unwrap();
        assert_eq!(terminator.link, None);
        assert_eq!(terminator.foreground, None);
    }
}

#[rstest]
#[case("<p>alpha</p>", "<p>zzz</p>")]
#[case("<p>alpha</p>", "<p></p>")]
#[case("<p><b>alpha</b></p>", "<p>omega</p>")]
fn sole_paragraph_keeps_its_terminator(#[case] old: &str, #[case] new: &str) {
    let ops = operations(old, new);

    // "alpha\n" is 1..7; its terminator sits at 6.
    for op in &ops {
        if let Operation::DeleteContentRange(delete) = op {
            assert!(delete.range.end_index <= 6, "{op:?} deletes the terminator");
        }
    }
}

#[rstest]
#[case("<p>a</p>")]
#[case("<h1>T</h1><table><tr><td>x</td><td><p>y</p><p>z</p></td></tr></table><p>after 😀</p>")]
#[case(r#"<doc><tab id="a"><p>one</p></tab><tab id="b"><body><p>two</p></body><footer id="f"><p>3</p></footer></tab></doc>"#)]
#[case("<sectionbreak/><p>x<pagebreak/></p><toc><p>h</p></toc><p></p>")]
fn spans_are_contiguous_from_the_origin(#[case] text: &str) {
    let doc = parse(text).unwrap();
    for tab in &doc.tabs {
        for segment in tab.segments() {
            invariants::check(segment);
        }
    }
}

#[test]
fn adding_a_section_break_is_refused() {
    let pristine = parse("<p>a</p><p>b</p>").unwrap();
    let current = parse("<p>a</p><sectionbreak/><p>b</p>").unwrap();
    let options = DiffOptions::default();
    let tree = diff(&pristine, &current, &options).unwrap();

    let err = generate(&tree, &options).unwrap_err();
    assert!(matches!(err, ValidationError::UnsupportedEdit { .. }));
}
