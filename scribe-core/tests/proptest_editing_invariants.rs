//! Property tests for editing invariants
//!
//! Covers toggle idempotence of inline formatting, bookmark round trips on
//! an unchanged document and markup round trips through the HTML processor.

use proptest::prelude::*;
use scribe_core::bookmark::{create_bookmark, restore_bookmark};
use scribe_core::html::HtmlProcessor;
use scribe_core::range::{position_at_text_offset, text_length, Bias, Range};
use scribe_core::surface::EditingSurface;
use scribe_core::{
    CommandName, CommandValue, Config, ContainerSurface, EditContext, Editor, EnvOptions,
};

fn words_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z]{1,6}", 1..5).prop_map(|words| words.join(" "))
}

fn paragraphs_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(words_strategy(), 1..=3)
}

fn inline_command() -> impl Strategy<Value = CommandName> {
    prop_oneof![
        Just(CommandName::Bold),
        Just(CommandName::Italic),
        Just(CommandName::Underline),
        Just(CommandName::Strikethrough),
    ]
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Text run wrapped in an optional inline element
#[derive(Debug, Clone)]
enum Segment {
    Plain(String),
    Wrapped(&'static str, String),
    Link(String, String),
}

impl Segment {
    fn to_html(&self) -> String {
        match self {
            Segment::Plain(text) => escape(text),
            Segment::Wrapped(tag, text) => format!("<{tag}>{}</{tag}>", escape(text)),
            Segment::Link(href, text) => {
                format!("<a href=\"{}\">{}</a>", escape(href), escape(text))
            }
        }
    }
}

fn segment_strategy() -> impl Strategy<Value = Segment> {
    let text = "[a-zA-Z<>&\"'][a-zA-Z <>&\"']{0,10}";
    prop_oneof![
        text.prop_map(Segment::Plain),
        (prop::sample::select(vec!["b", "i", "u", "em", "strong"]), text)
            .prop_map(|(tag, t)| Segment::Wrapped(tag, t)),
        ("/[a-z]{1,8}", text).prop_map(|(href, t)| Segment::Link(href, t)),
    ]
}

/// Paragraphs whose adjacent segments are never both plain text
fn markup_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::collection::vec(segment_strategy(), 1..5), 1..4).prop_map(
        |paragraphs| {
            paragraphs
                .iter()
                .map(|segments| {
                    let mut inner = String::new();
                    let mut last_plain = false;
                    for segment in segments {
                        let plain = matches!(segment, Segment::Plain(_));
                        if plain && last_plain {
                            continue;
                        }
                        last_plain = plain;
                        inner.push_str(&segment.to_html());
                    }
                    format!("<p>{inner}</p>")
                })
                .collect()
        },
    )
}

fn load(html: &str) -> EditContext {
    let mut ctx = ContainerSurface::new()
        .initialize_context()
        .expect("container context");
    HtmlProcessor::permissive()
        .set_content(&mut ctx, html)
        .expect("content loads");
    ctx
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_inline_toggle_twice_restores_markup(
        paragraphs in paragraphs_strategy(),
        command in inline_command(),
        a in 0usize..64,
        b in 0usize..64,
    ) {
        let html: String = paragraphs.iter().map(|p| format!("<p>{p}</p>")).collect();
        let mut editor = Editor::new(ContainerSurface::new(), Config::default());
        editor.start(&html).unwrap();
        editor.focus();
        let original = editor.content().unwrap();

        let len = text_length(editor.context().unwrap().doc(), editor.context().unwrap().root());
        let start = a % len;
        let end = start + 1 + b % (len - start);
        editor.select_text(start, end);

        for _ in 0..2 {
            let outcome = editor.execute(command, CommandValue::None, EnvOptions::default());
            prop_assert!(outcome.is_executed());
        }
        prop_assert_eq!(editor.content().unwrap(), original);
    }

    #[test]
    fn prop_bookmark_round_trip_on_unchanged_document(
        html in markup_strategy(),
        a in 0usize..200,
        b in 0usize..200,
    ) {
        let mut ctx = load(&html);
        let root = ctx.root();
        let len = text_length(ctx.doc(), root);
        let start = a % len;
        let end = start + 1 + b % (len - start);
        let range = Range::new(
            position_at_text_offset(ctx.doc(), root, start, Bias::Forward),
            position_at_text_offset(ctx.doc(), root, end, Bias::Backward),
        );
        ctx.set_selection(Some(range));

        let mark = create_bookmark(&ctx).expect("selection inside root");
        ctx.set_selection(None);
        prop_assert!(restore_bookmark(&mut ctx, &mark));
        prop_assert_eq!(ctx.selection_range(), Some(range));
    }

    #[test]
    fn prop_serialized_markup_reparses_to_same_tree(html in markup_strategy()) {
        let first = load(&html);
        let serialized = HtmlProcessor::permissive().serialize(&first);
        let second = load(&serialized);

        prop_assert!(first
            .doc()
            .structurally_equal(first.root(), second.doc(), second.root()));
        prop_assert_eq!(HtmlProcessor::permissive().serialize(&second), serialized);
    }
}
