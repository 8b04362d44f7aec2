use docs_reconcile_engine::indexing::invariants;
use docs_reconcile_engine::{
    DiffOptions, Document, Operation, apply, diff, generate, parse, to_structural_xml,
};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn reconcile(pristine: &Document, current: &Document) -> Vec<Operation> {
    let options = DiffOptions::default();
    let tree = diff(pristine, current, &options).unwrap();
    generate(&tree, &options).unwrap()
}

fn assert_round_trip(old: &str, new: &str) -> Vec<Operation> {
    let pristine = parse(old).unwrap();
    let current = parse(new).unwrap();
    let ops = reconcile(&pristine, &current);
    let applied = apply(&pristine, &ops).unwrap();
    for tab in &applied.tabs {
        for segment in tab.segments() {
            invariants::check(segment);
        }
    }
    assert_eq!(to_structural_xml(&applied), to_structural_xml(&current));
    ops
}

fn fixture(name: &str, side: &str) -> String {
    std::fs::read_to_string(format!(
        "{}/tests/fixtures/{name}/{side}.xml",
        env!("CARGO_MANIFEST_DIR")
    ))
    .unwrap()
}

#[rstest]
#[case("<p>Hello</p>")]
#[case("<h1>T</h1><li>a</li><li level=\"2\">b</li><p>x <b>y</b> z</p>")]
#[case("<table><tr><td>a</td><td><p>b</p><table><tr><td>c</td></tr></table></td></tr></table>")]
#[case(r#"<doc><body><p>a</p></body><header id="h"><p>top</p></header><footnote id="f"><p>n</p></footnote></doc>"#)]
#[case("<sectionbreak/><p>a<image src=\"x\"/>b</p><toc><p>Heading</p></toc>")]
fn identical_documents_need_no_operations(#[case] text: &str) {
    let doc = parse(text).unwrap();
    let tree = diff(&doc, &doc, &DiffOptions::default()).unwrap();
    assert!(tree.is_empty());
    assert_eq!(generate(&tree, &DiffOptions::default()).unwrap(), vec![]);
}

#[rstest]
#[case::word_edit("<p>Hello World</p>", "<p>Hello Universe</p>")]
#[case::sole_paragraph("<p>alpha</p>", "<p>zzz</p>")]
#[case::emptied_paragraph("<p>alpha</p>", "<p></p>")]
#[case::surrogates("<p>a😀b</p>", "<p>a😀x😀b</p>")]
#[case::bold("<p>plain text here</p>", "<p>plain <b>text</b> here</p>")]
#[case::unbold("<p><b>all bold</b></p>", "<p>all <b>bold</b></p>")]
#[case::link("<p>see</p>", r#"<p>see <a href="https://e.x/docs">docs</a></p>"#)]
#[case::color("<p>red</p>", r##"<p><span color="#ff0000">red</span></p>"##)]
#[case::heading("<p>Title</p><p>body</p>", "<h2>Title</h2><p>body</p>")]
#[case::alignment("<p>x</p>", r#"<p align="center">x</p>"#)]
#[case::bullets(
    "<p>one</p><p>two</p><p>end</p>",
    r#"<li>one</li><li level="1">two</li><p>end</p>"#
)]
#[case::list_kind(
    "<li>one</li><li>two</li><p></p>",
    r#"<li type="number">one</li><li type="number">two</li><p></p>"#
)]
#[case::unbullet("<li>one</li><p>end</p>", "<p>one</p><p>end</p>")]
#[case::insert_middle("<p>a</p><p>c</p>", "<p>a</p><p>b</p><p>c</p>")]
#[case::insert_front("<p>b</p>", "<h1>a</h1><p>b</p>")]
#[case::append("<p>a</p><p>b</p>", "<p>a</p><p>b</p><p>c</p><p>d</p>")]
#[case::delete_run("<p>a</p><p>b</p><p>c</p><p>d</p>", "<p>a</p><p>d</p>")]
#[case::delete_first("<p>a</p><p>b</p>", "<p>b</p>")]
#[case::replace_all(
    "<p>first one</p><p>second one</p>",
    "<p>completely</p><p>unrelated</p><p>text</p>"
)]
#[case::table_cell(
    "<table><tr><td>a</td><td>b</td></tr></table><p></p>",
    "<table><tr><td>a</td><td><b>B</b>!</td></tr></table><p></p>"
)]
#[case::table_rows(
    "<table><tr><td>alpha</td></tr><tr><td>beta</td></tr><tr><td>gamma</td></tr></table><p></p>",
    "<table><tr><td>zero</td></tr><tr><td>alpha</td></tr><tr><td>gamut</td></tr></table><p></p>"
)]
#[case::table_columns(
    "<table><tr><td>a</td><td>b</td><td>c</td></tr><tr><td>d</td><td>e</td><td>f</td></tr></table><p></p>",
    "<table><tr><td>a</td><td>c</td><td>new</td></tr><tr><td>d</td><td>f</td><td></td></tr></table><p></p>"
)]
#[case::table_added(
    "<p>before</p><p>after</p>",
    r#"<p>before</p><table widths="50,"><tr><td>x</td><td><li>y</li></td></tr></table><p>after</p>"#
)]
#[case::table_removed(
    "<p>before</p><table><tr><td>x</td></tr></table><p>after</p>",
    "<p>before</p><p>after</p>"
)]
#[case::table_replaced_by_text(
    "<p>a</p><table><tr><td>x</td></tr></table><p></p>",
    "<p>a</p><p>b</p><p></p>"
)]
#[case::nested_table(
    "<table><tr><td><p>out</p><table><tr><td>in</td></tr></table></td></tr></table><p></p>",
    "<table><tr><td><p>out</p><table><tr><td>inner</td></tr></table></td></tr></table><p></p>"
)]
#[case::header(
    r#"<doc><body><p>a</p></body><header id="h"><p>top</p></header></doc>"#,
    r#"<doc><body><p>a</p></body><header id="h"><p>new top</p></header></doc>"#
)]
#[case::header_removed(
    r#"<doc><body><p>a</p></body><footer id="f"><p>bottom</p></footer></doc>"#,
    "<doc><body><p>a</p></body></doc>"
)]
#[case::second_tab(
    r#"<doc><tab id="t1"><p>a</p></tab><tab id="t2"><p>b</p></tab></doc>"#,
    r#"<doc><tab id="t1"><p>a</p></tab><tab id="t2"><p>bc</p></tab></doc>"#
)]
fn generated_operations_reproduce_the_current_document(#[case] old: &str, #[case] new: &str) {
    assert_round_trip(old, new);
}

#[rstest]
#[case("report")]
#[case("meeting_notes")]
fn fixtures_round_trip(#[case] name: &str) {
    assert_round_trip(&fixture(name, "pristine"), &fixture(name, "current"));
}

#[test]
fn operations_address_pristine_indices_in_descending_order() {
    let ops = assert_round_trip(
        "<p>one</p><p>two</p><p>three</p><p>four</p>",
        "<p>one!</p><p>two</p><p>three?</p><p>four.</p>",
    );
    let starts: Vec<u32> = ops.iter().filter_map(Operation::start_index).collect();
    let mut sorted = starts.clone();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    assert_eq!(starts, sorted);
}

#[test]
fn second_tab_is_routed_by_tab_id() {
    let ops = assert_round_trip(
        r#"<doc><tab id="t1"><p>a</p></tab><tab id="t2"><p>b</p></tab></doc>"#,
        r#"<doc><tab id="t1"><p>a</p></tab><tab id="t2"><p>bc</p></tab></doc>"#,
    );
    insta::assert_snapshot!(serde_json::to_string(&ops).unwrap(), @r#"[{"insertText":{"text":"c","location":{"index":2,"tabId":"t2"}}}]"#);
}
