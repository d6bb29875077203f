//! Resolves the `liteserver.path_or_url` configuration value into a worker
//! list. Accepts either a local filesystem path or an `http(s)://` URL,
//! both pointing at a JSON document shaped like a TON global config's
//! `liteservers` array.

use gateway_common::config::LiteserverSourceConfig;
use gateway_common::model::LiteserverConfig;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct GlobalConfigDocument {
    liteservers: Vec<LiteserverEntry>,
}

#[derive(Debug, Deserialize)]
struct LiteserverEntry {
    address: String,
    port: u16,
    #[serde(default)]
    archival_hint: bool,
}

pub async fn load(
    source: &LiteserverSourceConfig,
    parallel_requests: u32,
) -> anyhow::Result<Vec<LiteserverConfig>> {
    let body = if source.path_or_url.starts_with("http://") || source.path_or_url.starts_with("https://") {
        reqwest::get(&source.path_or_url).await?.error_for_status()?.text().await?
    } else {
        tokio::fs::read_to_string(&source.path_or_url).await?
    };

    let document: GlobalConfigDocument = serde_json::from_str(&body)?;
    if document.liteservers.is_empty() {
        anyhow::bail!("liteserver source {} lists no liteservers", source.path_or_url);
    }

    Ok(document
        .liteservers
        .into_iter()
        .enumerate()
        .map(|(index, entry)| LiteserverConfig {
            index,
            address: entry.address,
            port: entry.port,
            archival_hint: entry.archival_hint,
            parallel_requests,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loads_liteservers_from_a_local_file() {
        let dir = std::env::temp_dir();
        let path = dir.join("gateway-test-global-config.json");
        tokio::fs::write(
            &path,
            r#"{"liteservers":[{"address":"1.2.3.4","port":1234},{"address":"5.6.7.8","port":5678,"archival_hint":true}]}"#,
        )
        .await
        .unwrap();

        let source = LiteserverSourceConfig { path_or_url: path.to_string_lossy().into_owned() };
        let liteservers = load(&source, 50).await.unwrap();

        assert_eq!(liteservers.len(), 2);
        assert_eq!(liteservers[0].index, 0);
        assert!(!liteservers[0].archival_hint);
        assert_eq!(liteservers[1].index, 1);
        assert!(liteservers[1].archival_hint);
        assert_eq!(liteservers[1].parallel_requests, 50);

        tokio::fs::remove_file(&path).await.ok();
    }

    #[tokio::test]
    async fn rejects_an_empty_liteserver_list() {
        let dir = std::env::temp_dir();
        let path = dir.join("gateway-test-empty-global-config.json");
        tokio::fs::write(&path, r#"{"liteservers":[]}"#).await.unwrap();

        let source = LiteserverSourceConfig { path_or_url: path.to_string_lossy().into_owned() };
        let result = load(&source, 50).await;
        assert!(result.is_err());

        tokio::fs::remove_file(&path).await.ok();
    }
}
