pub const COUNT_FRAMES: &str = r#"
() => ok(document.querySelectorAll('iframe, frame').length)
"#;

/// Fails with `no_such_frame` unless the frame's document is reachable.
pub const ENTER_FRAME: &str = r#"
(frame) => {
    const doc = scope(frame);
    return ok(doc.readyState);
}
"#;
