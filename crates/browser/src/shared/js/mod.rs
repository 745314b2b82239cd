pub mod element;
pub mod frame;

use serde_json::Value;

/// Helpers shared by every page-side script: the element registry, frame
/// scoping and locator resolution. Handles are `token:n` strings; the token
/// changes with every new document, so handles from before a reload never
/// resolve.
///
/// The registry holds nodes weakly and drops detached ones whenever a new
/// node is registered, so re-rendered fragments do not accumulate.
pub const RUNTIME: &str = r#"
const registry = (window.__settle = window.__settle || {
    token: Math.random().toString(36).slice(2),
    next: 0,
    refs: new Map(),
    ids: new WeakMap(),
});
const fail = (kind, error) => ({ success: false, kind, error });
const ok = (value) => ({ success: true, value });
const failure = (kind, error) => Object.assign(new Error(error), { settleKind: kind });
const scope = (frame) => {
    if (frame === null) return document;
    const host = document.querySelectorAll('iframe, frame')[frame];
    if (!host) throw failure('no_such_frame', 'no frame at index ' + frame);
    let doc = null;
    try { doc = host.contentDocument; } catch (e) {}
    if (!doc) throw failure('no_such_frame', 'frame ' + frame + ' is not accessible');
    return doc;
};
const find = (doc, by, value) => {
    if (by === 'id') {
        const el = doc.getElementById(value);
        return el ? [el] : [];
    }
    if (by === 'css') return Array.from(doc.querySelectorAll(value));
    const snapshot = doc.evaluate(value, doc, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
    const found = [];
    for (let i = 0; i < snapshot.snapshotLength; i++) found.push(snapshot.snapshotItem(i));
    return found;
};
const sweep = () => {
    for (const [id, ref] of registry.refs) {
        const el = ref.deref();
        if (!el || !el.isConnected) registry.refs.delete(id);
    }
};
const register = (el) => {
    const known = registry.ids.get(el);
    if (known !== undefined && registry.refs.has(known)) return known;
    sweep();
    const id = registry.token + ':' + (registry.next++);
    registry.refs.set(id, new WeakRef(el));
    registry.ids.set(el, id);
    return id;
};
const resolve = (id) => {
    const ref = registry.refs.get(id);
    const el = ref && ref.deref();
    if (!el || !el.isConnected) {
        registry.refs.delete(id);
        throw failure('stale', 'element ' + id + ' is no longer attached');
    }
    return el;
};
const isVisible = (el) => {
    const rect = el.getBoundingClientRect();
    const style = el.ownerDocument.defaultView.getComputedStyle(el);
    return rect.width > 0 && rect.height > 0 &&
        style.visibility !== 'hidden' && style.display !== 'none';
};
const isDisabled = (el) => el.disabled === true || el.getAttribute('aria-disabled') === 'true';
"#;

/// Wraps `func` applied to `args` with [`RUNTIME`]; thrown failures come back
/// as status envelopes.
pub fn build_js_call(func: &str, args: &[Value]) -> String {
    let args_str = args.iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "(() => {{\n{}\ntry {{\nreturn ({})({});\n}} catch (e) {{\nreturn fail(e.settleKind || 'script', String(e && e.message || e));\n}}\n}})()",
        RUNTIME, func, args_str
    )
}
