pub const LOCATE: &str = r#"
(frame, by, value, all) => {
    const found = find(scope(frame), by, value);
    if (!all && found.length === 0) return fail('not_found', by + '=' + value + ' matched nothing');
    return ok((all ? found : found.slice(0, 1)).map(register));
}
"#;

pub const CHECK_ELEMENT_STATE: &str = r#"
(id) => {
    const el = resolve(id);
    return ok({ visible: isVisible(el), enabled: !isDisabled(el) });
}
"#;

pub const SCROLL_INTO_VIEW: &str = r#"
(id, block) => {
    resolve(id).scrollIntoView({ behavior: 'instant', block: block || 'center' });
    return ok(null);
}
"#;

pub const SAFE_CLICK: &str = r#"
(id) => {
    const el = resolve(id);
    if (!isVisible(el)) return fail('not_interactable', 'element is not displayed');
    if (isDisabled(el)) return fail('not_interactable', 'element is disabled');

    const rect = el.getBoundingClientRect();
    const centerX = rect.left + rect.width / 2;
    const centerY = rect.top + rect.height / 2;
    const topEl = el.ownerDocument.elementFromPoint(centerX, centerY);
    if (topEl && topEl !== el && !el.contains(topEl)) {
        const name = topEl.tagName + (typeof topEl.className === 'string' && topEl.className
            ? '.' + topEl.className.trim().split(/\s+/).join('.')
            : '');
        return fail('intercepted', 'click would land on ' + name);
    }
    el.click();
    return ok(null);
}
"#;

pub const FOCUS: &str = r#"
(id) => {
    const el = resolve(id);
    el.focus();
    return ok(el.ownerDocument.activeElement === el);
}
"#;

pub const CLEAR: &str = r#"
(id) => {
    const el = resolve(id);
    if (!('value' in el)) return fail('not_interactable', 'element has no value');
    el.focus();
    el.value = '';
    el.dispatchEvent(new Event('input', { bubbles: true }));
    return ok(null);
}
"#;

pub const EXTRACT_ATTR: &str = r#"
(id, attr) => {
    const el = resolve(id);
    if (attr === 'value' && 'value' in el) return ok(String(el.value));
    return ok(el.getAttribute(attr));
}
"#;

pub const SET_VALUE: &str = r#"
(id, text) => {
    const el = resolve(id);
    el.focus();
    el.value = text;
    el.dispatchEvent(new Event('input', { bubbles: true }));
    el.dispatchEvent(new Event('change', { bubbles: true }));
    return ok(null);
}
"#;

pub const IS_STALE: &str = r#"
(id) => {
    const ref = registry.refs.get(id);
    const el = ref && ref.deref();
    return ok(!el || !el.isConnected);
}
"#;
