//! Unit tests for the console filter pipeline.

use launchport::launcher::filter::{AnnotatedLine, ConsoleFilter, FilterPipeline, LinkSpan};

/// Filter that consumes lines containing its needle and marks the match.
struct NeedleFilter {
    needle: &'static str,
    target: &'static str,
}

impl ConsoleFilter for NeedleFilter {
    fn consumes_line(&self, line: &str) -> Option<AnnotatedLine> {
        let start = line.find(self.needle)?;
        Some(AnnotatedLine {
            text: line.to_owned(),
            links: vec![LinkSpan {
                start,
                end: start + self.needle.len(),
                target: self.target.to_owned(),
            }],
        })
    }
}

#[test]
fn empty_pipeline_passes_lines_through() {
    let pipeline = FilterPipeline::new();
    let line = pipeline.apply("plain output");
    assert_eq!(line, AnnotatedLine::plain("plain output"));
}

#[test]
fn unconsumed_lines_pass_through_unmodified() {
    let mut pipeline = FilterPipeline::new();
    pipeline.push(Box::new(NeedleFilter {
        needle: "http://",
        target: "url",
    }));

    let line = pipeline.apply("no links here");
    assert_eq!(line.text, "no links here");
    assert!(line.links.is_empty());
}

#[test]
fn consuming_filter_annotates_the_line() {
    let mut pipeline = FilterPipeline::new();
    pipeline.push(Box::new(NeedleFilter {
        needle: "http://",
        target: "url",
    }));

    let line = pipeline.apply("see http://example for details");
    assert_eq!(line.links.len(), 1);
    assert_eq!(line.links[0].start, 4);
    assert_eq!(line.links[0].target, "url");
}

/// The first filter that consumes a line wins; later filters never see it.
#[test]
fn pipeline_order_is_first_wins() {
    let mut pipeline = FilterPipeline::new();
    pipeline.push(Box::new(NeedleFilter {
        needle: "match",
        target: "first",
    }));
    pipeline.push(Box::new(NeedleFilter {
        needle: "match",
        target: "second",
    }));

    let line = pipeline.apply("a match here");
    assert_eq!(line.links[0].target, "first");
}
