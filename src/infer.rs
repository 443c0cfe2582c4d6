//! Tag and audience inference through the Anthropic Messages API.
//!
//! Every call degrades instead of failing: a batch whose reply cannot be
//! parsed keeps empty tags, a channel keeps the default age group.

use anyhow::{Context, Result, anyhow};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::constants::constants;
use crate::model::{VALID_AGE_GROUPS, VALID_TAGS, is_valid_age_group, is_valid_tag};

/// Anything that turns a prompt into reply text.
pub(crate) trait Completion {
  async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String>;
}

#[derive(Serialize)]
struct Message<'a> {
  role: &'a str,
  content: &'a str,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
  model: &'a str,
  max_tokens: u32,
  messages: [Message<'a>; 1],
}

#[derive(Deserialize)]
struct ContentBlock {
  #[serde(rename = "type")]
  kind: String,
  #[serde(default)]
  text: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
  #[serde(default)]
  content: Vec<ContentBlock>,
}

#[derive(Debug, Clone)]
pub struct AnthropicClient {
  client: Client,
  base: String,
  key: String,
  model: String,
}

impl AnthropicClient {
  pub fn new(client: Client, key: String) -> Self {
    let c = constants();
    Self::with_base(client, key, c.llm_api_base.clone(), c.llm_model.clone())
  }

  pub fn with_base(client: Client, key: String, base: String, model: String) -> Self {
    Self { client, base: base.trim_end_matches('/').to_string(), key, model }
  }
}

impl Completion for AnthropicClient {
  async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
    let body =
      MessagesRequest { model: &self.model, max_tokens, messages: [Message { role: "user", content: prompt }] };
    let response = self
      .client
      .post(format!("{}/messages", self.base))
      .header("x-api-key", &self.key)
      .header("anthropic-version", &constants().llm_api_version)
      .json(&body)
      .send()
      .await
      .context("LLM request failed")?;
    let status = response.status();
    if !status.is_success() {
      let text = response.text().await.unwrap_or_default();
      return Err(anyhow!("LLM API error: {} - {}", status, text));
    }
    let parsed: MessagesResponse = response.json().await.context("Malformed LLM response")?;
    // Only the first block counts, and only if it is text.
    Ok(parsed.content.into_iter().next().filter(|b| b.kind == "text").map(|b| b.text).unwrap_or_default())
  }
}

/// The outermost `{ ... }` span of a reply, from the first `{` to the last `}`.
pub fn extract_json_object(text: &str) -> Option<&str> {
  let start = text.find('{')?;
  let end = text.rfind('}')?;
  (end > start).then(|| &text[start..=end])
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelInference {
  pub tags: Vec<String>,
  pub public: String,
}

impl Default for ChannelInference {
  fn default() -> Self {
    Self { tags: Vec::new(), public: constants().default_age_group.clone() }
  }
}

#[derive(Deserialize)]
struct RawChannelInference {
  #[serde(default)]
  tags: Vec<String>,
  #[serde(default)]
  public: String,
}

#[derive(Deserialize)]
struct RawVideoTags {
  index: usize,
  #[serde(default)]
  tags: Vec<String>,
}

#[derive(Deserialize)]
struct RawVideoBatch {
  #[serde(default)]
  videos: Vec<RawVideoTags>,
}

fn valid_tags(tags: Vec<String>) -> Vec<String> {
  let mut kept: Vec<String> = Vec::new();
  for tag in tags {
    if is_valid_tag(&tag) && !kept.contains(&tag) {
      kept.push(tag);
    }
  }
  kept
}

/// Parse a channel reply. Unknown tags are dropped, an unknown age group
/// becomes the default one.
pub fn parse_channel_inference(text: &str) -> Result<ChannelInference> {
  let json = extract_json_object(text).ok_or_else(|| anyhow!("No JSON found in response"))?;
  let raw: RawChannelInference = serde_json::from_str(json).context("Unparsable channel inference")?;
  let public = if is_valid_age_group(&raw.public) { raw.public } else { constants().default_age_group.clone() };
  Ok(ChannelInference { tags: valid_tags(raw.tags), public })
}

/// Parse a video batch reply into `index → tags`.
pub fn parse_video_tags(text: &str) -> Result<Vec<(usize, Vec<String>)>> {
  let json = extract_json_object(text).ok_or_else(|| anyhow!("No JSON found in response"))?;
  let raw: RawVideoBatch = serde_json::from_str(json).context("Unparsable video tags")?;
  Ok(raw.videos.into_iter().map(|v| (v.index, valid_tags(v.tags))).collect())
}

fn channel_prompt(name: &str, description: &str, sample_titles: &[String]) -> String {
  let samples: Vec<String> =
    sample_titles.iter().take(constants().channel_sample_titles).map(|t| format!("- {}", t)).collect();
  format!(
    "Analyse cette chaîne YouTube éducative et détermine:\n\
     1. Les tags appropriés parmi: {}\n\
     2. La tranche d'âge cible parmi: {}\n\n\
     Chaîne: {}\n\
     Description: {}\n\
     Exemples de titres de vidéos:\n{}\n\n\
     Réponds UNIQUEMENT en JSON avec ce format exact:\n\
     {{\"tags\": [\"tag1\", \"tag2\"], \"public\": \"tranche d'âge\"}}",
    VALID_TAGS.join(", "),
    VALID_AGE_GROUPS.join(", "),
    name,
    description,
    samples.join("\n")
  )
}

fn videos_prompt(offset: usize, titles: &[String]) -> String {
  let listing: Vec<String> = titles.iter().enumerate().map(|(i, t)| format!("[{}] {}", offset + i, t)).collect();
  format!(
    "Analyse ces vidéos YouTube éducatives et attribue des tags à chacune.\n\
     Tags disponibles: {}\n\n\
     Vidéos:\n{}\n\n\
     Réponds UNIQUEMENT en JSON avec ce format exact:\n\
     {{\"videos\": [{{\"index\": 0, \"tags\": [\"tag1\", \"tag2\"]}}, ...]}}\n\n\
     Attribue 1 à 3 tags pertinents par vidéo. Si aucun tag ne correspond, utilise un tableau vide.",
    VALID_TAGS.join(", "),
    listing.join("\n")
  )
}

/// Tags and age group for a channel, from its name, description and a few titles.
pub async fn infer_channel<C: Completion>(
  llm: &C,
  name: &str,
  description: &str,
  sample_titles: &[String],
) -> ChannelInference {
  let prompt = channel_prompt(name, description, sample_titles);
  let reply = match llm.complete(&prompt, constants().channel_max_tokens).await {
    Ok(reply) => reply,
    Err(e) => {
      warn!(channel = name, err = %format!("{:#}", e), "infer: channel request failed");
      return ChannelInference::default();
    }
  };
  parse_channel_inference(&reply).unwrap_or_else(|e| {
    warn!(channel = name, err = %format!("{:#}", e), "infer: channel reply rejected");
    ChannelInference::default()
  })
}

/// Tags for each title, keyed by position in `titles`. Titles in a failed
/// batch are absent from the map.
pub async fn infer_video_tags<C: Completion>(llm: &C, titles: &[String]) -> HashMap<usize, Vec<String>> {
  let mut results = HashMap::new();
  let batch_size = constants().inference_batch_size.max(1);

  for (batch_no, batch) in titles.chunks(batch_size).enumerate() {
    let offset = batch_no * batch_size;
    let prompt = videos_prompt(offset, batch);
    let parsed = match llm.complete(&prompt, constants().video_max_tokens).await {
      Ok(reply) => parse_video_tags(&reply),
      Err(e) => Err(e),
    };
    match parsed {
      Ok(items) => {
        let range = offset..offset + batch.len();
        for (index, tags) in items {
          if range.contains(&index) {
            results.insert(index, tags);
          }
        }
        debug!(offset, size = batch.len(), "infer: video batch tagged");
      }
      Err(e) => warn!(offset, err = %format!("{:#}", e), "infer: video batch failed, keeping empty tags"),
    }
  }
  results
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use httpmock::prelude::*;
  use serde_json::json;
  use std::sync::Mutex;

  /// Replays canned replies in order; `None` entries fail the request.
  pub(crate) struct ScriptedLlm {
    pub(crate) replies: Mutex<Vec<Option<String>>>,
    pub(crate) prompts: Mutex<Vec<String>>,
  }

  impl ScriptedLlm {
    pub(crate) fn new(replies: Vec<Option<&str>>) -> Self {
      let mut replies: Vec<Option<String>> = replies.into_iter().map(|r| r.map(str::to_string)).collect();
      replies.reverse();
      Self { replies: Mutex::new(replies), prompts: Mutex::new(Vec::new()) }
    }
  }

  impl Completion for ScriptedLlm {
    async fn complete(&self, prompt: &str, _max_tokens: u32) -> Result<String> {
      self.prompts.lock().unwrap().push(prompt.to_string());
      match self.replies.lock().unwrap().pop() {
        Some(Some(reply)) => Ok(reply),
        _ => Err(anyhow!("scripted failure")),
      }
    }
  }

  #[test]
  fn extracts_json_span_from_chatty_reply() {
    let reply = "Voici la réponse:\n{\"tags\": [\"arts\"], \"public\": \"adultes\"}\nBonne journée";
    assert_eq!(extract_json_object(reply), Some("{\"tags\": [\"arts\"], \"public\": \"adultes\"}"));
    assert_eq!(extract_json_object("no braces"), None);
    assert_eq!(extract_json_object("} backwards {"), None);
  }

  #[test]
  fn channel_reply_is_validated() {
    let got = parse_channel_inference(r#"{"tags": ["chimie", "cuisine", "chimie"], "public": "ados"}"#).unwrap();
    assert_eq!(got.tags, vec!["chimie".to_string()]);
    assert_eq!(got.public, "tout public");
    assert!(parse_channel_inference("{tags: nope}").is_err());
  }

  #[test]
  fn video_reply_drops_unknown_tags() {
    let got = parse_video_tags(r#"{"videos": [{"index": 0, "tags": ["sport", "foot"]}, {"index": 1}]}"#).unwrap();
    assert_eq!(got, vec![(0, vec!["sport".to_string()]), (1, vec![])]);
  }

  #[tokio::test]
  async fn failed_batch_does_not_abort_the_others() {
    let titles: Vec<String> = (0..45).map(|i| format!("Vidéo {}", i)).collect();
    let llm = ScriptedLlm::new(vec![
      Some(r#"{"videos": [{"index": 0, "tags": ["histoire"]}, {"index": 19, "tags": ["arts"]}]}"#),
      Some("désolé, je ne peux pas"),
      Some(r#"{"videos": [{"index": 40, "tags": ["sport"]}, {"index": 3, "tags": ["sport"]}]}"#),
    ]);
    let tags = infer_video_tags(&llm, &titles).await;
    assert_eq!(llm.prompts.lock().unwrap().len(), 3);
    assert_eq!(tags.get(&0), Some(&vec!["histoire".to_string()]));
    assert_eq!(tags.get(&19), Some(&vec!["arts".to_string()]));
    assert_eq!(tags.get(&40), Some(&vec!["sport".to_string()]));
    // Index outside the batch that produced it is ignored.
    assert_eq!(tags.get(&3), None);
    assert!(llm.prompts.lock().unwrap()[2].contains("[40] Vidéo 40"));
  }

  #[tokio::test]
  async fn channel_inference_falls_back_to_defaults() {
    let llm = ScriptedLlm::new(vec![None]);
    let got = infer_channel(&llm, "Labo", "Chimie", &["Atomes".to_string()]).await;
    assert_eq!(got, ChannelInference::default());
  }

  #[tokio::test]
  async fn channel_prompt_limits_samples() {
    let llm = ScriptedLlm::new(vec![Some(r#"{"tags": ["musique"], "public": "5-10 ans"}"#)]);
    let titles: Vec<String> = (0..15).map(|i| format!("titre-{}", i)).collect();
    let got = infer_channel(&llm, "Solfège", "", &titles).await;
    assert_eq!(got.public, "5-10 ans");
    let prompt = llm.prompts.lock().unwrap()[0].clone();
    assert!(prompt.contains("- titre-9"));
    assert!(!prompt.contains("- titre-10"));
  }

  #[tokio::test]
  async fn anthropic_client_sends_headers_and_reads_text() {
    let server = MockServer::start_async().await;
    let mock = server
      .mock_async(|when, then| {
        when.method(POST).path("/messages").header("x-api-key", "SECRET").header_exists("anthropic-version");
        then.status(200).json_body(json!({
          "content": [{"type": "text", "text": "{\"tags\": [], \"public\": \"adultes\"}"}]
        }));
      })
      .await;
    let llm = AnthropicClient::with_base(Client::new(), "SECRET".into(), server.base_url(), "test-model".into());
    let reply = llm.complete("bonjour", 16).await.unwrap();
    mock.assert_async().await;
    assert_eq!(parse_channel_inference(&reply).unwrap().public, "adultes");
  }

  #[tokio::test]
  async fn anthropic_client_reports_http_errors() {
    let server = MockServer::start_async().await;
    server
      .mock_async(|when, then| {
        when.method(POST).path("/messages");
        then.status(529).body("overloaded");
      })
      .await;
    let llm = AnthropicClient::with_base(Client::new(), "k".into(), server.base_url(), "m".into());
    let err = llm.complete("x", 16).await.unwrap_err();
    assert!(format!("{:#}", err).contains("overloaded"));
  }
}
