use std::collections::HashMap;
use std::sync::Arc;

use zipdensity_core::{FetchError, FetchOutcome, FetchedPage, PageFetcher, ZipCode};

/// Fixed-response fetcher standing in for the reference host.
#[derive(Clone, Default)]
pub struct StubFetcher {
    pages: Arc<HashMap<String, Result<String, FetchError>>>,
}

impl StubFetcher {
    pub fn new(entries: Vec<(&str, Result<String, FetchError>)>) -> Self {
        let pages = entries
            .into_iter()
            .map(|(zip, response)| (zip.to_string(), response))
            .collect();
        Self {
            pages: Arc::new(pages),
        }
    }
}

impl PageFetcher for StubFetcher {
    async fn fetch(&self, zip: &ZipCode) -> FetchOutcome {
        let url = format!("https://stub.test/zip-code/{zip}/zip-code-{zip}.asp");
        match self.pages.get(zip.as_str()) {
            Some(Ok(html)) => Ok(FetchedPage::new(url, html.as_bytes().to_vec())),
            Some(Err(e)) => Err(e.clone()),
            None => Err(FetchError::HttpStatus {
                status: 404,
                url,
            }),
        }
    }
}

pub fn density_page(place: &str, density: &str) -> String {
    format!(
        "<html><body><h1>{place}</h1>\
         <p>{place} has a population density of {density} people per square mile.</p>\
         </body></html>"
    )
}

pub fn table_page(density: &str) -> String {
    format!(
        "<html><body><table><tr>\
         <td class=\"label\">Population Density:</td><td class=\"info\">{density}</td>\
         </tr></table></body></html>"
    )
}
