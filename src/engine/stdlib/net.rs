//! `http` module: blocking HTTP requests.
//!
//! Responses are structs with `status`, `url` and `body` fields.

use std::time::Duration;

use starlark::environment::GlobalsBuilder;
use starlark::starlark_module;
use starlark::values::structs::AllocStruct;
use starlark::values::{Heap, Value};

use super::BuiltinRegistry;
use crate::engine::build;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub fn register(registry: &mut BuiltinRegistry) {
    registry.register("http", || build::freeze_namespace("http", http_members));
}

fn client() -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()?)
}

fn response<'v>(heap: &'v Heap, resp: reqwest::blocking::Response) -> anyhow::Result<Value<'v>> {
    let status = resp.status().as_u16() as i32;
    let url = resp.url().to_string();
    let body = resp.text()?;
    Ok(heap.alloc(AllocStruct(vec![
        ("status".to_owned(), heap.alloc(status)),
        ("url".to_owned(), heap.alloc(url)),
        ("body".to_owned(), heap.alloc(body)),
    ])))
}

#[starlark_module]
fn http_members(builder: &mut GlobalsBuilder) {
    fn get<'v>(url: &str, heap: &'v Heap) -> anyhow::Result<Value<'v>> {
        log::debug!("http get {}", url);
        response(heap, client()?.get(url).send()?)
    }

    fn post<'v>(
        url: &str,
        body: Option<&str>,
        content_type: Option<&str>,
        heap: &'v Heap,
    ) -> anyhow::Result<Value<'v>> {
        log::debug!("http post {}", url);
        let request = client()?
            .post(url)
            .header(
                reqwest::header::CONTENT_TYPE,
                content_type.unwrap_or("text/plain"),
            )
            .body(body.unwrap_or_default().to_owned());
        response(heap, request.send()?)
    }
}
