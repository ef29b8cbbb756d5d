use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use log::info;

use crate::error::Result;
use crate::listing::{self, Listing};
use crate::utils::compute_cosine_similarity;

pub const SCORE_PREFIX: &str = "match_probability_";
pub const AVERAGE_COLUMN: &str = "average_match_probability";

/// How listings are scored against a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Method {
    /// Cosine similarity of sentence embeddings.
    Embedding,
    /// Fraction of query terms found in the listing text.
    Keyword,
}

/// Turns texts into fixed-size vectors.
pub trait Embedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Scoring strategy for one ranking run. Never switches mid-run.
pub enum Scorer<'a> {
    Keyword,
    Embedding(&'a dyn Embedder),
}

/// `match_probability_<query with spaces as underscores>`
pub fn score_column(query: &str) -> String {
    format!("{}{}", SCORE_PREFIX, query.replace(' ', "_"))
}

/// Lowercase title, company, field and description joined by spaces.
fn keyword_text(listing: &Listing) -> String {
    [
        listing.title.as_str(),
        listing.company.as_str(),
        listing.field.as_str(),
        listing.description.as_deref().unwrap_or(""),
    ]
    .join(" ")
    .to_lowercase()
}

/// Matched query terms over total query terms, in [0, 1].
pub fn keyword_score(query: &str, text: &str) -> f32 {
    let text = text.to_lowercase();
    let terms: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
    if terms.is_empty() {
        return 0.0;
    }
    let matched = terms.iter().filter(|t| text.contains(t.as_str())).count();
    matched as f32 / terms.len() as f32
}

/// Cosine similarity of the query against precomputed listing vectors.
pub fn embedding_scores(
    embedder: &dyn Embedder,
    query: &str,
    job_embeddings: &[Vec<f32>],
) -> Result<Vec<f32>> {
    let query_embedding = embedder
        .embed(&[query.to_string()])?
        .into_iter()
        .next()
        .unwrap_or_default();
    Ok(job_embeddings
        .iter()
        .map(|job| compute_cosine_similarity(&query_embedding, job))
        .collect())
}

#[derive(Debug, Clone)]
pub struct RankedListing {
    pub listing: Listing,
    /// One value per entry of `Ranking::columns`.
    pub scores: Vec<f32>,
}

impl RankedListing {
    /// Score the ranking is sorted by.
    pub fn primary_score(&self) -> f32 {
        self.scores.last().copied().unwrap_or(0.0)
    }
}

/// Listings with score columns, sorted descending by the last column.
#[derive(Debug, Clone)]
pub struct Ranking {
    pub columns: Vec<String>,
    pub rows: Vec<RankedListing>,
}

impl Ranking {
    /// Name of the column the rows are sorted by.
    pub fn sort_column(&self) -> Option<&str> {
        self.columns.last().map(String::as_str)
    }

    /// Header and string cells for CSV export.
    pub fn to_table(&self) -> (Vec<String>, Vec<Vec<String>>) {
        let listings: Vec<Listing> = self.rows.iter().map(|r| r.listing.clone()).collect();
        let (mut header, with_description) = listing::header(&listings);
        header.extend(self.columns.iter().cloned());

        let rows = self
            .rows
            .iter()
            .map(|r| {
                let mut row = r.listing.row(with_description);
                row.extend(r.scores.iter().map(|s| s.to_string()));
                row
            })
            .collect();
        (header, rows)
    }
}

fn score_query(
    scorer: &Scorer<'_>,
    query: &str,
    listings: &[Listing],
    job_embeddings: &[Vec<f32>],
) -> Result<Vec<f32>> {
    match scorer {
        Scorer::Keyword => Ok(listings
            .iter()
            .map(|l| keyword_score(query, &keyword_text(l)))
            .collect()),
        Scorer::Embedding(embedder) => embedding_scores(*embedder, query, job_embeddings),
    }
}

/// Scores every listing against every query. With several queries an
/// `average_match_probability` column is added and used for ordering.
pub fn rank(listings: Vec<Listing>, queries: &[String], scorer: &Scorer<'_>) -> Result<Ranking> {
    let job_embeddings = match scorer {
        Scorer::Embedding(embedder) => {
            let texts: Vec<String> = listings.iter().map(Listing::job_text).collect();
            embedder.embed(&texts)?
        }
        Scorer::Keyword => Vec::new(),
    };

    let mut columns = Vec::with_capacity(queries.len() + 1);
    let mut per_query = Vec::with_capacity(queries.len());
    for query in queries {
        info!("Processing query: '{}'", query);
        per_query.push(score_query(scorer, query, &listings, &job_embeddings)?);
        columns.push(score_column(query));
    }

    let mut rows: Vec<RankedListing> = listings
        .into_iter()
        .enumerate()
        .map(|(i, listing)| RankedListing {
            listing,
            scores: per_query.iter().map(|col| col.get(i).copied().unwrap_or(0.0)).collect(),
        })
        .collect();

    if queries.len() > 1 {
        for row in &mut rows {
            let mean = row.scores.iter().sum::<f32>() / row.scores.len() as f32;
            row.scores.push(mean);
        }
        columns.push(AVERAGE_COLUMN.to_string());
    }

    rows.sort_by(|a, b| {
        b.primary_score()
            .partial_cmp(&a.primary_score())
            .unwrap_or(Ordering::Equal)
    });

    Ok(Ranking { columns, rows })
}

/// Top `limit` matches for one query. Keyword search leaves out listings
/// that match no term at all.
pub fn search(
    listings: Vec<Listing>,
    query: &str,
    scorer: &Scorer<'_>,
    limit: usize,
) -> Result<Vec<(Listing, f32)>> {
    let ranking = rank(listings, &[query.to_string()], scorer)?;
    let keep_zero = matches!(scorer, Scorer::Embedding(_));
    Ok(ranking
        .rows
        .into_iter()
        .map(|r| {
            let score = r.primary_score();
            (r.listing, score)
        })
        .filter(|(_, score)| keep_zero || *score > 0.0)
        .take(limit)
        .collect())
}

/// Default file for a ranking export.
pub fn ranked_output_path(data_dir: &Path, queries: &[String], stamp: &str) -> PathBuf {
    let name = match queries {
        [single] => {
            let query: String = single.replace(' ', "_").chars().take(30).collect();
            format!("ranked_jobs_{}_{}.csv", query, stamp)
        }
        _ => format!("ranked_jobs_multiple_queries_{}.csv", stamp),
    };
    data_dir.join(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn listing(title: &str, description: &str) -> Listing {
        let mut l = Listing::new(title, format!("https://erasmusintern.org/{}", title), 1);
        l.description = Some(description.to_string());
        l
    }

    /// Maps each text to a 2-d vector: (mentions rust, mentions design).
    struct TopicEmbedder;

    impl Embedder for TopicEmbedder {
        fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let t = t.to_lowercase();
                    vec![
                        if t.contains("rust") { 1.0 } else { 0.0 },
                        if t.contains("design") { 1.0 } else { 0.1 },
                    ]
                })
                .collect())
        }
    }

    struct BrokenEmbedder;

    impl Embedder for BrokenEmbedder {
        fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(Error::EmbeddingsUnavailable("model missing".into()))
        }
    }

    #[test]
    fn keyword_score_counts_fraction_of_terms() {
        let text = "Title: Python intern. Company: Acme";
        assert_eq!(keyword_score("python data", text), 0.5);
        assert_eq!(keyword_score("PYTHON acme", text), 1.0);
        assert_eq!(keyword_score("rust", text), 0.0);
        assert_eq!(keyword_score("   ", text), 0.0);
    }

    #[test]
    fn rank_sorts_descending() {
        let listings = vec![
            listing("A", "alpha"),
            listing("B", "alpha beta gamma delta zeta"),
            listing("C", "alpha beta"),
        ];
        // scores: A = 0.2, B = 1.0, C = 0.4
        let query = "alpha beta gamma delta zeta".to_string();

        let ranking = rank(listings, &[query.clone()], &Scorer::Keyword).unwrap();

        let order: Vec<_> = ranking.rows.iter().map(|r| r.listing.title.as_str()).collect();
        assert_eq!(order, vec!["B", "C", "A"]);
        assert_eq!(ranking.columns, vec![score_column(&query)]);
        assert_eq!(ranking.sort_column(), Some("match_probability_alpha_beta_gamma_delta_zeta"));
    }

    #[test]
    fn multiple_queries_add_average_column() {
        let listings = vec![listing("A", "python data sql cloud")];
        let queries = vec![
            "python java cloud go cobol".to_string(),
            "python data sql cloud go".to_string(),
        ];

        let ranking = rank(listings, &queries, &Scorer::Keyword).unwrap();

        assert_eq!(ranking.columns.len(), 3);
        assert_eq!(ranking.columns[2], AVERAGE_COLUMN);
        let scores = &ranking.rows[0].scores;
        assert!((scores[0] - 0.4).abs() < 1e-6);
        assert!((scores[1] - 0.8).abs() < 1e-6);
        assert!((scores[2] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn average_orders_multi_query_ranking() {
        let listings = vec![listing("low", "python"), listing("high", "python rust")];
        let queries = vec!["python".to_string(), "rust".to_string()];

        let ranking = rank(listings, &queries, &Scorer::Keyword).unwrap();

        assert_eq!(ranking.rows[0].listing.title, "high");
        assert_eq!(ranking.sort_column(), Some(AVERAGE_COLUMN));
    }

    #[test]
    fn embedding_scores_rank_semantic_matches_first() {
        let listings = vec![
            listing("Graphic", "design posters"),
            listing("Systems", "rust services"),
        ];

        let scorer = Scorer::Embedding(&TopicEmbedder);
        let ranking = rank(listings, &["rust".to_string()], &scorer).unwrap();

        assert_eq!(ranking.rows[0].listing.title, "Systems");
        assert!(ranking.rows[0].primary_score() > ranking.rows[1].primary_score());
        assert!(ranking.rows[0].primary_score() <= 1.0 + 1e-6);
    }

    #[test]
    fn embedding_failure_is_reported_not_replaced() {
        let scorer = Scorer::Embedding(&BrokenEmbedder);
        let err = rank(vec![listing("A", "x")], &["x".to_string()], &scorer).unwrap_err();
        assert!(matches!(err, Error::EmbeddingsUnavailable(_)));
    }

    #[test]
    fn keyword_search_drops_non_matches_and_limits() {
        let listings = vec![
            listing("One", "python"),
            listing("Two", "java"),
            listing("Three", "python data"),
            listing("Four", "python data"),
        ];

        let results = search(listings, "python data", &Scorer::Keyword, 2).unwrap();

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|(_, s)| *s == 1.0));
    }

    #[test]
    fn table_appends_score_columns() {
        let queries = ["python".to_string()];
        let ranking = rank(vec![listing("A", "python")], &queries, &Scorer::Keyword).unwrap();

        let (header, rows) = ranking.to_table();

        assert_eq!(header.last().map(String::as_str), Some("match_probability_python"));
        assert_eq!(header[9], "description");
        assert_eq!(rows[0].last().map(String::as_str), Some("1"));
    }

    #[test]
    fn output_path_truncates_long_queries() {
        let long = ["machine learning engineering internship".to_string()];
        let single = ranked_output_path(Path::new("data"), &long, "T");
        assert_eq!(
            single,
            Path::new("data/ranked_jobs_machine_learning_engineering_i_T.csv")
        );

        let multi = ranked_output_path(Path::new("data"), &["a".to_string(), "b".to_string()], "T");
        assert_eq!(multi, Path::new("data/ranked_jobs_multiple_queries_T.csv"));
    }
}
