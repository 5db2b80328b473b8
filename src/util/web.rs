use wasm_bindgen::{JsCast, JsValue, UnwrapThrowExt};
use web_sys::{window, Document, Window};

const NO_WINDOW: &str = "window is not available in this context";
const NO_DOCUMENT: &str = "document is not available in this context";

pub fn get_window() -> Window {
    window().expect_throw(NO_WINDOW)
}

pub fn get_document_from(window: &Window) -> Document {
    window.document().expect_throw(NO_DOCUMENT)
}

pub fn get_document() -> Document {
    get_document_from(&get_window())
}

/// URLs of the scripts the page has loaded so far, in document order.
/// Inline scripts have no URL and are skipped.
pub fn document_script_urls() -> Vec<String> {
    let scripts = get_document().scripts();
    let mut urls = Vec::with_capacity(scripts.length() as usize);
    for i in 0..scripts.length() {
        let Some(element) = scripts.item(i) else {
            continue;
        };
        let Ok(script) = element.dyn_into::<web_sys::HtmlScriptElement>() else {
            continue;
        };
        let src = script.src();
        if !src.is_empty() {
            urls.push(src);
        }
    }
    urls
}

/// Resolves `url` against the document base URI.
pub fn resolve_url(url: &str) -> Result<String, JsValue> {
    let base = match get_document().base_uri()? {
        Some(base) if !base.is_empty() => base,
        _ => get_window().location().href()?,
    };
    let resolved = web_sys::Url::new_with_base(url, &base)?;
    Ok(resolved.href())
}

/// Packages source text as an executable blob and returns its object URL.
/// The caller owns the URL and must release it with [`revoke_script_url`].
pub fn script_url(source: &str) -> Result<String, JsValue> {
    let blob_parts = js_sys::Array::new_with_length(1);
    blob_parts.set(0, JsValue::from_str(source));

    let options = web_sys::BlobPropertyBag::new();
    options.set_type("application/javascript");

    let blob = web_sys::Blob::new_with_str_sequence_and_options(&blob_parts, &options)?;
    web_sys::Url::create_object_url_with_blob(&blob)
}

pub fn revoke_script_url(url: &str) {
    let _ = web_sys::Url::revoke_object_url(url);
}

pub fn worker_global() -> web_sys::DedicatedWorkerGlobalScope {
    js_sys::global().unchecked_into::<web_sys::DedicatedWorkerGlobalScope>()
}

pub fn worker_post_message(msg: &JsValue) -> Result<(), JsValue> {
    worker_global().post_message(msg)
}

/// True if `global` exposes the worker-only script-import primitive.
pub fn has_import_scripts(global: &JsValue) -> bool {
    js_sys::Reflect::has(global, &JsValue::from_str("importScripts")).unwrap_or(false)
}

pub fn set_panic_hook_once() {
    console_error_panic_hook::set_once();
}
