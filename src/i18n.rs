/*
Simple i18n helper for status output.

This module provides:
- A tiny embedded translations store for JA/EN (compile-time embedded JSON).
- A simple `tr` function to lookup translations by key + optional params.

Usage:
    use crate::i18n;
    let msg = i18n::tr(Some("en"), "sync.processing", Some(&[("title", "Morning stream")]));

Notes:
- Placeholders in translation strings use single-brace format: `{name}`.
- Default language is `ja`. If a key is missing for the requested language,
  the fallback language will be used.
- The `event.*` labels end up inside created calendar events.
*/

use std::collections::HashMap;
use std::sync::OnceLock;

pub const DEFAULT_LANG: &str = "ja";

static TRANSLATIONS: OnceLock<HashMap<String, HashMap<String, String>>> = OnceLock::new();

const JA_JSON: &str = r#"
{
  "app.name": "YouTube配信予定カレンダー同期",
  "app.starting": "同期サービスを開始します (チャンネル {count} 件)",
  "config.missing_env": "必要な環境変数が設定されていません: {vars}",
  "config.no_channels": "監視するチャンネルIDを設定してください",
  "config.invalid_value": "環境変数の値が不正です: {var}",
  "event.stream_url_label": "配信URL",
  "event.channel_label": "チャンネル",
  "sync.channel_fetching": "チャンネル {channel} の配信予定を取得中...",
  "sync.channel_fetched": "配信予定 {count} 件を取得",
  "sync.processing": "処理中: {title}",
  "sync.existing_found": "既存のイベントが見つかりました: {summary}",
  "sync.event_created": "新しいイベントを作成しました: {title}",
  "sync.match_error": "既存イベントチェックエラー ({title}): {err}",
  "sync.create_error": "カレンダーイベント作成エラー ({title}): {err}",
  "sync.channel_error": "チャンネル {channel} の同期でエラー: {err}",
  "sync.channel_done": "チャンネル {channel}: 作成 {created} 件 / スキップ {skipped} 件 / 失敗 {failed} 件",
  "sync.batch_done": "同期処理完了: 成功 {ok} / 失敗 {errors} チャンネル, 作成 {created} 件, スキップ {skipped} 件, 失敗 {failed} 件"
}
"#;

const EN_JSON: &str = r#"
{
  "app.name": "YouTube Stream Calendar Sync",
  "app.starting": "Starting sync service ({count} channel(s))",
  "config.missing_env": "Required environment variables are not set: {vars}",
  "config.no_channels": "Please configure the channel IDs to watch",
  "config.invalid_value": "Invalid value for environment variable: {var}",
  "event.stream_url_label": "Stream URL",
  "event.channel_label": "Channel",
  "sync.channel_fetching": "Fetching upcoming streams for channel {channel}...",
  "sync.channel_fetched": "Fetched {count} upcoming stream(s)",
  "sync.processing": "Processing: {title}",
  "sync.existing_found": "Existing event found: {summary}",
  "sync.event_created": "Created new event: {title}",
  "sync.match_error": "Failed to check existing events ({title}): {err}",
  "sync.create_error": "Failed to create calendar event ({title}): {err}",
  "sync.channel_error": "Sync failed for channel {channel}: {err}",
  "sync.channel_done": "Channel {channel}: created {created} / skipped {skipped} / failed {failed}",
  "sync.batch_done": "Sync finished: {ok} channel(s) ok / {errors} failed, created {created}, skipped {skipped}, failed {failed}"
}
"#;

/// Initialize translations map (lazy).
fn build_translations() -> HashMap<String, HashMap<String, String>> {
    let mut out: HashMap<String, HashMap<String, String>> = HashMap::new();

    let ja_map: HashMap<String, String> = serde_json::from_str(JA_JSON).unwrap_or_else(|e| {
        panic!("failed to parse JA_JSON in i18n module: {}", e);
    });
    out.insert("ja".to_string(), ja_map);

    let en_map: HashMap<String, String> = serde_json::from_str(EN_JSON).unwrap_or_else(|e| {
        panic!("failed to parse EN_JSON in i18n module: {}", e);
    });
    out.insert("en".to_string(), en_map);

    out
}

/// Returns the global translations map (lang -> (key -> message)).
fn translations() -> &'static HashMap<String, HashMap<String, String>> {
    TRANSLATIONS.get_or_init(build_translations)
}

/// Normalize a language tag into a short, lowercase code (e.g. "en-US" -> "en").
pub fn normalize_language(lang: &str) -> String {
    lang.split('-').next().unwrap_or(lang).to_lowercase()
}

/// Returns true if the given language code has a translation catalogue.
pub fn is_supported_language(lang: &str) -> bool {
    translations().contains_key(lang)
}

/// Translate a key using an explicit language (or default if None).
///
/// - `lang`: optional language code (`"ja"`, `"en"`). If None, DEFAULT_LANG is used.
/// - `key`: translation key (flat string, e.g. "sync.processing").
/// - `params`: optional slice of (name, value) for placeholder replacement.
///
/// If no translation is found the default language value is used, and failing
/// that the key itself.
pub fn tr(lang: Option<&str>, key: &str, params: Option<&[(&str, &str)]>) -> String {
    let map = translations();

    let desired = lang.unwrap_or(DEFAULT_LANG);

    let val = map
        .get(desired)
        .and_then(|m| m.get(key))
        .cloned()
        .or_else(|| map.get(DEFAULT_LANG).and_then(|m| m.get(key)).cloned())
        .unwrap_or_else(|| key.to_string());

    match params {
        Some(params) => fill_placeholders(&val, params),
        None => val,
    }
}

/// Replace `{name}` placeholders in one pass over the template, so values that
/// themselves contain `{...}` are inserted verbatim.
fn fill_placeholders(template: &str, params: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let name = &after[..close];
            params
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| (*v, close))
        });
        match value {
            Some((v, close)) => {
                out.push_str(v);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tr_basic() {
        let s = tr(Some("en"), "event.stream_url_label", None);
        assert_eq!(s, "Stream URL");
        assert_eq!(tr(None, "event.stream_url_label", None), "配信URL");
    }

    #[test]
    fn test_tr_with_params() {
        let s = tr(None, "sync.channel_fetching", Some(&[("channel", "UC123")]));
        assert_eq!(s, "チャンネル UC123 の配信予定を取得中...");
    }

    #[test]
    fn values_are_not_expanded_again() {
        let s = tr(
            Some("en"),
            "sync.create_error",
            Some(&[("title", "Q&A {err} night"), ("err", "HTTP 500")]),
        );
        assert_eq!(s, "Failed to create calendar event (Q&A {err} night): HTTP 500");
    }

    #[test]
    fn unknown_placeholders_are_left_alone() {
        let s = tr(Some("en"), "sync.processing", Some(&[("other", "x")]));
        assert_eq!(s, "Processing: {title}");
    }

    #[test]
    fn test_fallback_to_default() {
        let s = tr(Some("fr"), "event.channel_label", None);
        assert_eq!(s, "チャンネル");
    }

    #[test]
    fn missing_key_returns_key() {
        let k = "non.existent.key";
        assert_eq!(tr(Some("en"), k, None), k.to_string());
    }

    #[test]
    fn catalogues_have_the_same_keys() {
        let map = translations();
        let mut ja: Vec<_> = map["ja"].keys().collect();
        let mut en: Vec<_> = map["en"].keys().collect();
        ja.sort();
        en.sort();
        assert_eq!(ja, en);
    }

    #[test]
    fn test_is_supported_language() {
        assert!(is_supported_language("ja"));
        assert!(is_supported_language("en"));
        assert!(!is_supported_language("ru"));
    }

    #[test]
    fn test_normalize_language() {
        assert_eq!(normalize_language("en-US"), "en");
        assert_eq!(normalize_language("JA"), "ja");
    }
}
