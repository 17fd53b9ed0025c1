//! Page-side functions evaluated by [`super::ChromiumSurface`]
//!
//! Each is a function declaration passed to `Runtime.callFunctionOn` with JSON
//! arguments, never interpolated. Every function returns `{ found, data }` where
//! `found` is `false` when the scrollable container (or the capture feed) is gone.

/// Resolves the list container: the tagged node if still attached, otherwise the
/// first descendant of the dialog whose content overflows vertically.
macro_rules! locate_scroller {
    () => {
        "const locate = () => {
            const tagged = document.querySelector('[data-roster-scroller]');
            if (tagged && tagged.isConnected) return tagged;
            const dialog = document.querySelector('div[role=\"dialog\"]');
            if (!dialog) return null;
            for (const node of [dialog, ...dialog.querySelectorAll('div')]) {
                const overflow = getComputedStyle(node).overflowY;
                if ((overflow === 'auto' || overflow === 'scroll')
                    && node.scrollHeight > node.clientHeight) {
                    node.setAttribute('data-roster-scroller', '');
                    return node;
                }
            }
            return null;
        };
        const rect = (node) => {
            const r = node.getBoundingClientRect();
            return { left: r.left, top: r.top, width: r.width, height: r.height };
        };
        const metrics = (el) => ({
            position: el.scrollTop,
            content_extent: el.scrollHeight,
            visible_extent: el.clientHeight,
            viewport: rect(el),
        });
        const anchor = (a) => ({ href: a.getAttribute('href') || '', region: rect(a) });
        const el = locate();
        if (!el) return { found: false, data: null };"
    };
}

pub(super) const METRICS: &str = concat!(
    "() => {",
    locate_scroller!(),
    "return { found: true, data: metrics(el) };
    }"
);

pub(super) const SCROLL_BY: &str = concat!(
    "(delta) => {",
    locate_scroller!(),
    "el.scrollTop = el.scrollTop + delta;
        return { found: true, data: metrics(el) };
    }"
);

pub(super) const SCROLL_TO: &str = concat!(
    "(position) => {",
    locate_scroller!(),
    "el.scrollTop = position;
        return { found: true, data: metrics(el) };
    }"
);

pub(super) const ANCHORS_WITHIN: &str = concat!(
    "(left, top, width, height) => {",
    locate_scroller!(),
    "const scope = el.closest('[role=\"dialog\"]') || el;
        const hits = [];
        for (const a of scope.querySelectorAll('a[href^=\"/\"]')) {
            const r = a.getBoundingClientRect();
            if (r.left <= left + width && left <= r.right
                && r.top <= top + height && top <= r.bottom) {
                hits.push(anchor(a));
            }
        }
        return { found: true, data: hits };
    }"
);

pub(super) const ANCHORS_IN_SUBTREE: &str = concat!(
    "() => {",
    locate_scroller!(),
    "return { found: true, data: Array.from(el.querySelectorAll('a[href]'), anchor) };
    }"
);

pub(super) const CAPTURE_INSTALL: &str = concat!(
    "(key) => {",
    locate_scroller!(),
    "const feed = { seen: new Set(), events: 0 };
        const collect = (node) => {
            if (node.nodeType !== 1) return;
            if (node.matches('a[href]')) feed.seen.add(node.getAttribute('href'));
            for (const a of node.querySelectorAll('a[href]')) feed.seen.add(a.getAttribute('href'));
        };
        feed.observer = new MutationObserver((records) => {
            for (const record of records) {
                for (const node of record.addedNodes) {
                    feed.events += 1;
                    collect(node);
                }
            }
        });
        feed.observer.observe(el, { childList: true, subtree: true });
        window[key] = feed;
        return { found: true, data: null };
    }"
);

pub(super) const CAPTURE_DRAIN: &str = "(key) => {
    const feed = window[key];
    if (!feed) return { found: false, data: null };
    return { found: true, data: { raw: Array.from(feed.seen), events: feed.events } };
}";

pub(super) const CAPTURE_UNINSTALL: &str = "(key) => {
    const feed = window[key];
    if (feed) {
        feed.observer.disconnect();
        delete window[key];
    }
    return { found: !!feed, data: null };
}";
