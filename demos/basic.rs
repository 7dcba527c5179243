use std::time::Duration;

use api_engine_http::{RequestConfig, RequestEngine};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize)]
struct Post {
    #[serde(default)]
    id: Option<u64>,
    title: String,
    body: String,
    #[serde(rename = "userId")]
    user_id: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let base_url = std::env::var("API_BASE_URL")
        .unwrap_or_else(|_| "https://jsonplaceholder.typicode.com".to_owned());
    let api = RequestEngine::with_headers(base_url, [("Accept", "application/json")]);

    let ttl = Some(Duration::from_secs(60));
    let first: Post = api.get("/posts/1", (), ttl).await?;
    // Served from the cache.
    let again: Post = api.get("/posts/1", (), ttl).await?;
    println!("{first:?}\n{again:?}");

    let draft = Post {
        id: None,
        title: "hello".to_owned(),
        body: "from api-engine-http".to_owned(),
        user_id: 1,
    };
    let config = RequestConfig::new()
        .timeout(Duration::from_secs(5))
        .retries(2)
        .retry_delay(Duration::from_millis(250));
    let created: Post = api.post("/posts", &draft, config).await?;
    println!("created {created:?}");

    match api.get::<Post>("/posts/999999", (), None).await {
        Ok(post) => println!("unexpected {post:?}"),
        Err(err) => println!("{:?} ({}): {err}", err.kind(), err.status),
    }

    api.clear_cache();
    Ok(())
}
