//! `csvrag ask` and `csvrag retrieve`: one-shot ingest + query over a CSV file.

use anyhow::{bail, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use csv_rag_core::error::RagError;
use csv_rag_core::models::{Answer, RetrievalResult};
use csv_rag_core::pipeline::Pipeline;
use csv_rag_core::retrieve::{validate_query, RetrievalParams};

use crate::completion::ChatCompletionClient;
use crate::config::Config;
use crate::embedding;
use crate::table::{load_csv, resolve_columns};

/// Build a [`Pipeline`] from configuration.
pub fn build_pipeline(config: &Config) -> Result<Pipeline> {
    let embedder = embedding::create_embedder(&config.embedding)?;
    let completion = Arc::new(ChatCompletionClient::new(&config.generation)?);
    Ok(Pipeline::new(embedder, completion)
        .with_params(config.retrieval.params())
        .with_batch_size(config.embedding.batch_size))
}

/// Resolve the completion credential: explicit value first, then the
/// environment variable named in `generation.api_key_env`.
pub fn resolve_credential(config: &Config, explicit: Option<String>) -> Result<String> {
    if let Some(key) = explicit.filter(|k| !k.trim().is_empty()) {
        return Ok(key);
    }
    match std::env::var(&config.generation.api_key_env) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => bail!(
            "An API key is required. Pass --api-key or set {}.",
            config.generation.api_key_env
        ),
    }
}

/// Call [`Pipeline::ask`], retrying rate-limit and timeout failures.
///
/// Backoff doubles from `base_delay` (1s, 2s, 4s, ... capped at 2^5 × base).
pub async fn ask_with_retry(
    pipeline: &Pipeline,
    query: &str,
    credential: &str,
    max_retries: u32,
    base_delay: Duration,
) -> csv_rag_core::Result<Answer> {
    let mut attempt = 0u32;
    loop {
        match pipeline.ask(query, credential).await {
            Err(e) if e.is_retriable() && attempt < max_retries => {
                attempt += 1;
                let delay = base_delay * (1u32 << (attempt - 1).min(5));
                tracing::warn!(
                    error = %e,
                    attempt,
                    max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "retrying completion"
                );
                tokio::time::sleep(delay).await;
            }
            other => return other,
        }
    }
}

pub async fn run_ask(
    config: &Config,
    csv_path: &Path,
    columns: Option<&str>,
    query: &str,
    top_k: Option<usize>,
    api_key: Option<String>,
) -> Result<()> {
    validate_query(query)?;
    let credential = resolve_credential(config, api_key)?;

    let pipeline = prepare(config, csv_path, columns, top_k).await?;

    let answer = ask_with_retry(
        &pipeline,
        query,
        &credential,
        config.generation.max_retries,
        Duration::from_secs(1),
    )
    .await?;

    for hit in &answer.sources.hits {
        tracing::info!(row = hit.document.id, score = hit.score, "context row");
    }
    println!("{}", answer.text);
    Ok(())
}

pub async fn run_retrieve(
    config: &Config,
    csv_path: &Path,
    columns: Option<&str>,
    query: &str,
    top_k: Option<usize>,
    json: bool,
) -> Result<()> {
    validate_query(query)?;

    let pipeline = prepare(config, csv_path, columns, top_k).await?;
    let result = pipeline.retrieve(query).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_hits(&result);
    }
    Ok(())
}

async fn prepare(
    config: &Config,
    csv_path: &Path,
    columns: Option<&str>,
    top_k: Option<usize>,
) -> Result<Pipeline> {
    let table = load_csv(csv_path)?;
    let selected = resolve_columns(&table, columns);

    let mut params: RetrievalParams = config.retrieval.params();
    if let Some(k) = top_k {
        if k == 0 {
            return Err(RagError::InvalidTopK.into());
        }
        params.top_k = k;
    }

    let pipeline = build_pipeline(config)?.with_params(params);
    let summary = pipeline.ingest(&table, &selected).await?;
    let short_hash = &summary.corpus_hash[..12];
    tracing::info!(
        documents = summary.documents,
        model = %summary.model,
        dims = summary.dims,
        corpus = %short_hash,
        "index built"
    );
    Ok(pipeline)
}

fn print_hits(result: &RetrievalResult) {
    if result.is_empty() {
        println!("No results.");
        return;
    }
    for (rank, hit) in result.hits.iter().enumerate() {
        println!(
            "{}. [{:.4}] row {}: {}",
            rank + 1,
            hit.score,
            hit.document.id,
            hit.document.text
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use csv_rag_core::embedding::Embedder;
    use csv_rag_core::generate::{ChatMessage, CompletionClient};
    use csv_rag_core::models::Table;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ConstEmbedder;

    #[async_trait]
    impl Embedder for ConstEmbedder {
        fn model_name(&self) -> &str {
            "const"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, texts: &[String]) -> csv_rag_core::Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    /// Fails with `error` for the first `failures` calls, then answers.
    struct FlakyCompletion {
        failures: usize,
        error: RagError,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CompletionClient for FlakyCompletion {
        fn model_name(&self) -> &str {
            "flaky"
        }
        async fn complete(
            &self,
            _messages: &[ChatMessage],
            _credential: &str,
        ) -> csv_rag_core::Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(self.error.clone())
            } else {
                Ok("done".to_string())
            }
        }
    }

    async fn ready_pipeline(completion: Arc<FlakyCompletion>) -> Pipeline {
        let p = Pipeline::new(Arc::new(ConstEmbedder), completion);
        let table = Table::new(vec!["x".into()], vec![vec!["row".into()]]);
        p.ingest(&table, &["x".to_string()]).await.unwrap();
        p
    }

    #[tokio::test]
    async fn test_retries_rate_limited_then_succeeds() {
        let completion = Arc::new(FlakyCompletion {
            failures: 2,
            error: RagError::RateLimited("429".into()),
            calls: AtomicUsize::new(0),
        });
        let p = ready_pipeline(completion.clone()).await;
        let answer = ask_with_retry(&p, "q", "k", 3, Duration::from_millis(1))
            .await
            .unwrap();
        assert_eq!(answer.text, "done");
        assert_eq!(completion.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let completion = Arc::new(FlakyCompletion {
            failures: 10,
            error: RagError::GenerationTimeout(1),
            calls: AtomicUsize::new(0),
        });
        let p = ready_pipeline(completion.clone()).await;
        let err = ask_with_retry(&p, "q", "k", 2, Duration::from_millis(1))
            .await
            .unwrap_err();
        assert_eq!(err, RagError::GenerationTimeout(1));
        assert_eq!(completion.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_terminal_errors_not_retried() {
        let completion = Arc::new(FlakyCompletion {
            failures: 10,
            error: RagError::AuthenticationFailed("401".into()),
            calls: AtomicUsize::new(0),
        });
        let p = ready_pipeline(completion.clone()).await;
        let err = ask_with_retry(&p, "q", "k", 5, Duration::from_millis(1))
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::AuthenticationFailed(_)));
        assert_eq!(completion.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_explicit_credential_wins() {
        let cfg = Config::default();
        assert_eq!(
            resolve_credential(&cfg, Some("sk-explicit".into())).unwrap(),
            "sk-explicit"
        );
    }

    #[test]
    fn test_missing_credential_names_env_var() {
        let mut cfg = Config::default();
        cfg.generation.api_key_env = "CSVRAG_TEST_KEY_THAT_IS_NOT_SET".into();
        let err = resolve_credential(&cfg, None).unwrap_err();
        assert!(err.to_string().contains("CSVRAG_TEST_KEY_THAT_IS_NOT_SET"));
    }
}
