use std::time::Duration;

use log::{debug, info, warn};
use reqwest::blocking::Client;
use url::Url;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::extract;
use crate::listing::{self, Listing};
use crate::utils::Pacer;

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Debug, Clone, Copy)]
pub struct ScrapeOptions {
    /// Page cap; 0 scrapes every detected page.
    pub max_pages: usize,
    /// Visit each listing's detail page.
    pub fetch_details: bool,
}

/// Pages to visit given the detected total and a cap (0 = no cap). Never
/// more than page numbers can address.
pub fn effective_pages(detected: usize, cap: usize) -> u32 {
    let pages = if cap > 0 { detected.min(cap) } else { detected };
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// Sequential crawler for the traineeship index. One request in flight at a time.
pub struct Scraper {
    client: Client,
    base_url: Url,
    pacer: Pacer,
}

impl Scraper {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Scraper {
            client,
            base_url,
            pacer: Pacer::default(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.base_url.clone(), config.request_timeout)
    }

    #[cfg(test)]
    pub fn with_pacer(mut self, pacer: Pacer) -> Self {
        self.pacer = pacer;
        self
    }

    fn fetch(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text()?)
    }

    /// Index URL for a 1-based page number. The site's `page` parameter is 0-based.
    pub fn page_url(&self, page_num: u32) -> String {
        let sep = if self.base_url.query().is_some() { '&' } else { '?' };
        format!("{}{}page={}", self.base_url, sep, page_num.saturating_sub(1))
    }

    /// Number of index pages, read from the first page's pager. 1 if unreadable.
    pub fn total_pages(&self) -> usize {
        let url = self.page_url(1);
        match self.fetch(&url) {
            Ok(body) => extract::parse_total_pages(&body),
            Err(e) => {
                warn!("Error determining total pages: {}", e);
                1
            }
        }
    }

    /// Listings on one index page. Fetch failures yield an empty page.
    pub fn scrape_page(&self, page_num: u32) -> Vec<Listing> {
        let url = self.page_url(page_num);
        info!("Scraping page {}: {}", page_num, url);

        let body = match self.fetch(&url) {
            Ok(body) => body,
            Err(e) => {
                warn!("Error fetching page {}: {}", page_num, e);
                return Vec::new();
            }
        };

        let listings = extract::parse_listing_page(&body, page_num, &self.base_url);
        if listings.is_empty() {
            warn!("No traineeships found on page {}", page_num);
        } else {
            info!("Extracted {} traineeships from page {}", listings.len(), page_num);
        }
        listings
    }

    /// Enriches a listing from its detail page. On failure the listing is
    /// returned untouched.
    pub fn fetch_details(&self, listing: Listing) -> Listing {
        debug!("Getting details for: {}", listing.title);
        self.pacer.detail_delay();

        match self.fetch(&listing.url) {
            Ok(body) => {
                let details = extract::parse_details(&body);
                listing::merge(listing, &details)
            }
            Err(e) => {
                warn!("Error fetching details for {}: {}", listing.url, e);
                listing
            }
        }
    }

    /// Crawls pages 1..=N in order, where N is the detected page count capped
    /// by `options.max_pages`.
    pub fn scrape_all(&self, options: ScrapeOptions) -> Vec<Listing> {
        let detected = self.total_pages();
        info!("Found {} pages of traineeships", detected);

        let total = effective_pages(detected, options.max_pages);
        if (total as usize) < detected {
            info!("Will scrape the first {} pages", total);
        }

        let mut all = Vec::new();
        for page in 1..=total {
            let listings = self.scrape_page(page);

            if let Some(sample) = listings.first() {
                debug!(
                    "Sample before details: title={:?} duration={:?} post_date={:?} deadline={:?}",
                    sample.title, sample.duration, sample.post_date, sample.deadline
                );
            }

            if options.fetch_details {
                all.extend(listings.into_iter().map(|l| self.fetch_details(l)));
            } else {
                all.extend(listings);
            }

            if page < total {
                self.pacer.page_delay();
            }
        }
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::NOT_SPECIFIED;
    use httpmock::prelude::*;

    fn index_page(pager_last: Option<usize>, titles: &[(&str, &str)]) -> String {
        let mut html = String::from("<html><body><div class=\"view-content\">");
        for (title, href) in titles {
            html.push_str(&format!(
                "<div class=\"media-list-items\"><h3 class=\"dot-title\"><a href=\"{}\">{}</a></h3>\
                 <div class=\"ds-top-footer\"><div class=\"field-name-field-traineeship-duration\">\
                 <div class=\"field-item\">3 months</div></div></div></div>",
                href, title
            ));
        }
        html.push_str("</div>");
        if let Some(last) = pager_last {
            html.push_str(&format!(
                "<ul class=\"pager\"><li class=\"pager-last\">\
                 <a href=\"/traineeships?page={}\">last</a></li></ul>",
                last
            ));
        }
        html.push_str("</body></html>");
        html
    }

    fn scraper(server: &MockServer) -> Scraper {
        let base = Url::parse(&server.url("/traineeships")).unwrap();
        Scraper::new(base, Duration::from_secs(5))
            .unwrap()
            .with_pacer(Pacer::none())
    }

    #[test]
    fn page_url_is_zero_based_and_respects_existing_query() {
        let plain = Scraper::new(
            Url::parse("https://erasmusintern.org/traineeships").unwrap(),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(plain.page_url(1), "https://erasmusintern.org/traineeships?page=0");
        assert_eq!(plain.page_url(4), "https://erasmusintern.org/traineeships?page=3");

        let filtered = Scraper::new(
            Url::parse("https://erasmusintern.org/traineeships?field=it").unwrap(),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(
            filtered.page_url(2),
            "https://erasmusintern.org/traineeships?field=it&page=1"
        );
    }

    #[test]
    fn effective_pages_applies_positive_cap() {
        assert_eq!(effective_pages(10, 3), 3);
        assert_eq!(effective_pages(2, 5), 2);
        assert_eq!(effective_pages(10, 0), 10);
    }

    #[test]
    fn effective_pages_never_exceeds_addressable_pages() {
        assert_eq!(effective_pages(usize::MAX, 0), u32::MAX);
        assert_eq!(effective_pages(usize::MAX, 4), 4);
    }

    #[test]
    fn page_cap_limits_crawl_to_first_pages() {
        let server = MockServer::start();
        let mut mocks = Vec::new();
        for p in 0..10 {
            let body = index_page(Some(9), &[("Job", "/traineeship/x")]);
            mocks.push(server.mock(|when, then| {
                when.method(GET)
                    .path("/traineeships")
                    .query_param("page", p.to_string())
                    .header("user-agent", USER_AGENT);
                then.status(200).body(body);
            }));
        }

        let listings = scraper(&server).scrape_all(ScrapeOptions {
            max_pages: 3,
            fetch_details: false,
        });

        assert_eq!(listings.len(), 3);
        assert_eq!(
            listings.iter().map(|l| l.page_number).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        // page=0 serves both the pager lookup and page 1
        mocks[0].assert_hits(2);
        mocks[1].assert_hits(1);
        mocks[2].assert_hits(1);
        for m in &mocks[3..] {
            m.assert_hits(0);
        }
    }

    #[test]
    fn failed_page_is_skipped_and_crawl_continues() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/traineeships").query_param("page", "0");
            then.status(200)
                .body(index_page(Some(2), &[("First", "/traineeship/a")]));
        });
        server.mock(|when, then| {
            when.method(GET).path("/traineeships").query_param("page", "1");
            then.status(500);
        });
        server.mock(|when, then| {
            when.method(GET).path("/traineeships").query_param("page", "2");
            then.status(200)
                .body(index_page(None, &[("Third", "/traineeship/c")]));
        });

        let listings = scraper(&server).scrape_all(ScrapeOptions {
            max_pages: 0,
            fetch_details: false,
        });

        let titles: Vec<_> = listings.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, vec!["First", "Third"]);
        assert_eq!(listings[1].page_number, 3);
    }

    #[test]
    fn unreachable_index_means_single_page() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/traineeships");
            then.status(503);
        });

        let s = scraper(&server);
        assert_eq!(s.total_pages(), 1);
        assert!(s.scrape_page(1).is_empty());
    }

    #[test]
    fn details_fill_gaps_without_overwriting() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/traineeships").query_param("page", "0");
            then.status(200)
                .body(index_page(None, &[("Analyst", "/traineeship/analyst")]));
        });
        let detail = server.mock(|when, then| {
            when.method(GET).path("/traineeship/analyst");
            then.status(200).body(
                "<div class=\"field-name-field-duration\"><div class=\"field-item\">Duration: 6 months</div></div>\
                 <div class=\"date-posted\">Posted: 05/03/2025</div>\
                 <div class=\"field-name-body\"><div class=\"field-item\">Analyse data with Python.</div></div>",
            );
        });

        let listings = scraper(&server).scrape_all(ScrapeOptions {
            max_pages: 0,
            fetch_details: true,
        });

        detail.assert();
        let l = &listings[0];
        assert_eq!(l.url, server.url("/traineeship/analyst"));
        assert_eq!(l.duration, "3 months");
        assert_eq!(l.post_date, "05/03/2025");
        assert_eq!(l.description.as_deref(), Some("Analyse data with Python."));
        assert_eq!(l.company, NOT_SPECIFIED);
    }

    #[test]
    fn failed_detail_fetch_returns_listing_unchanged() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/traineeship/gone");
            then.status(404);
        });

        let s = scraper(&server);
        let original = Listing::new("Gone", server.url("/traineeship/gone"), 1);

        assert_eq!(s.fetch_details(original.clone()), original);
    }
}
