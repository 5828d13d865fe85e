use axum::{
    extract::{Json, State},
    http::StatusCode,
};
use diesel::prelude::*;
use lazy_static::lazy_static;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::{
    allocation,
    model::{Track, User},
    schema::users,
    utils, DbPool,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Book,
    Video,
    Web,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResourceLevel {
    #[serde(rename = "Başlangıç")]
    Baslangic,
    #[serde(rename = "Orta")]
    Orta,
    #[serde(rename = "İleri")]
    Ileri,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Resource {
    pub kind: ResourceKind,
    pub title: &'static str,
    pub provider: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<&'static str>,
    pub level: ResourceLevel,
    pub tags: &'static [&'static str],
}

const fn res(
    kind: ResourceKind,
    title: &'static str,
    provider: &'static str,
    url: Option<&'static str>,
    level: ResourceLevel,
    tags: &'static [&'static str],
) -> Resource {
    Resource {
        kind,
        title,
        provider,
        url,
        level,
        tags,
    }
}

const FALLBACK: Resource = res(
    ResourceKind::Web,
    "Genel Kaynak",
    "Khan Academy",
    Some("https://tr.khanacademy.org"),
    ResourceLevel::Orta,
    &["sayisal", "ea", "sozel", "dil"],
);

lazy_static! {
    static ref RESOURCE_BANK: HashMap<&'static str, Vec<Resource>> = {
        let mut bank = HashMap::new();
        bank.insert("Matematik", vec![
            res(ResourceKind::Book, "Antrenmanlarla Matematik", "Antrenman", None, ResourceLevel::Baslangic, &["sayisal", "ea"]),
            res(ResourceKind::Book, "TYT Matematik Soru Bankası", "Karekök", None, ResourceLevel::Orta, &["sayisal", "ea"]),
            res(ResourceKind::Video, "Hocalara Geldik - TYT Matematik", "YouTube", Some("https://www.youtube.com/@hocalarageldik"), ResourceLevel::Orta, &["sayisal", "ea"]),
            res(ResourceKind::Web, "Khan Academy Türkçe - Matematik", "Khan Academy", Some("https://tr.khanacademy.org"), ResourceLevel::Baslangic, &["sayisal", "ea"]),
            res(ResourceKind::Book, "Apotemi AYT Matematik", "Apotemi", None, ResourceLevel::Ileri, &["sayisal", "ea"]),
        ]);
        bank.insert("Geometri", vec![
            res(ResourceKind::Book, "AYT Geometri Soru Bankası", "Apotemi", None, ResourceLevel::Ileri, &["sayisal", "ea"]),
            res(ResourceKind::Video, "Tonguç Geometri", "YouTube", Some("https://www.youtube.com/@tongucakademi"), ResourceLevel::Orta, &["sayisal", "ea"]),
        ]);
        bank.insert("Fizik", vec![
            res(ResourceKind::Book, "Palme Temel Set", "Palme", None, ResourceLevel::Baslangic, &["sayisal"]),
            res(ResourceKind::Book, "AYT Fizik Soru Bankası", "Aydın", None, ResourceLevel::Ileri, &["sayisal"]),
            res(ResourceKind::Video, "Parafizik", "YouTube", Some("https://www.youtube.com/@parafizik"), ResourceLevel::Orta, &["sayisal"]),
        ]);
        bank.insert("Kimya", vec![
            res(ResourceKind::Book, "AYT Kimya Soru Bankası", "Endemik", None, ResourceLevel::Ileri, &["sayisal"]),
            res(ResourceKind::Video, "Kimya Adası", "YouTube", Some("https://www.youtube.com/@kimyaadasi"), ResourceLevel::Orta, &["sayisal"]),
        ]);
        bank.insert("Biyoloji", vec![
            res(ResourceKind::Book, "Palme TYT Biyoloji", "Palme", None, ResourceLevel::Baslangic, &["sayisal"]),
            res(ResourceKind::Book, "AYT Biyoloji Soru Bankası", "Bilgi Sarmal", None, ResourceLevel::Ileri, &["sayisal"]),
            res(ResourceKind::Video, "BiyolojiGUN", "YouTube", Some("https://www.youtube.com/@BiyolojiGUN"), ResourceLevel::Orta, &["sayisal"]),
        ]);
        bank.insert("Türkçe", vec![
            res(ResourceKind::Book, "Türkçe Kolay Seri", "Paraf", None, ResourceLevel::Baslangic, &["sayisal", "ea", "sozel", "dil"]),
            res(ResourceKind::Book, "TYT Türkçe Paragraf", "Paraf", None, ResourceLevel::Orta, &["sayisal", "ea", "sozel", "dil"]),
            res(ResourceKind::Video, "Paragrafiks", "YouTube", Some("https://www.youtube.com/@paragrafiks"), ResourceLevel::Orta, &["sayisal", "ea", "sozel", "dil"]),
            res(ResourceKind::Book, "Bilgi Sarmal Denemeleri", "Bilgi Sarmal", None, ResourceLevel::Ileri, &["ea", "sozel"]),
        ]);
        bank.insert("Sosyal", vec![
            res(ResourceKind::Book, "TYT Sosyal Bilimler Soru Bankası", "Bilgi Sarmal", None, ResourceLevel::Orta, &["ea", "sozel"]),
            res(ResourceKind::Video, "Hocalara Geldik - TYT Sosyal", "YouTube", Some("https://www.youtube.com/@hocalarageldik"), ResourceLevel::Orta, &["ea", "sozel"]),
        ]);
        bank.insert("Yabancı Dil", vec![
            res(ResourceKind::Book, "YDT Vocabulary", "Modadil", None, ResourceLevel::Orta, &["dil"]),
            res(ResourceKind::Web, "Cambridge English Practice", "Cambridge", Some("https://www.cambridgeenglish.org"), ResourceLevel::Ileri, &["dil"]),
        ]);
        bank
    };
}

pub fn difficulty_for_level(level: i32) -> ResourceLevel {
    if level <= 2 {
        ResourceLevel::Baslangic
    } else if level == 3 {
        ResourceLevel::Orta
    } else {
        ResourceLevel::Ileri
    }
}

/// Top suggestions per subject of the track: entries tagged for the track
/// rank first, then entries matching the user's difficulty bucket.
pub fn suggest(track: Track, level: i32) -> BTreeMap<&'static str, Vec<Resource>> {
    let bucket = difficulty_for_level(level);
    let mut suggestions = BTreeMap::new();

    for (subject, _) in allocation::track_weights(track) {
        let mut ranked: Vec<Resource> = RESOURCE_BANK
            .get(subject)
            .cloned()
            .unwrap_or_else(|| vec![FALLBACK]);
        ranked.sort_by_key(|r| (!r.tags.contains(&track.as_str()), r.level != bucket));
        ranked.truncate(5);
        suggestions.insert(*subject, ranked);
    }

    suggestions
}

// --- Handler ---

#[derive(Serialize)]
pub struct ResourcesResponse {
    pub track: &'static str,
    pub level: i32,
    pub resources: BTreeMap<&'static str, Vec<Resource>>,
}

pub async fn get_resources(
    State(pool): State<DbPool>,
    session: tower_sessions::Session,
) -> Result<Json<ResourcesResponse>, (StatusCode, String)> {
    let user_id = match utils::get_current_user_id(&session).await {
        Some(id) => id,
        None => return Err((StatusCode::UNAUTHORIZED, "Not logged in".to_string())),
    };

    let mut conn = pool.get().map_err(|e| {
        (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
    })?;

    let user = users::table
        .find(user_id)
        .select(User::as_select())
        .first::<User>(&mut conn)
        .map_err(|e| {
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
        })?;

    let track = user.track();
    Ok(Json(ResourcesResponse {
        track: track.as_str(),
        level: user.level,
        resources: suggest(track, user.level),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_tagged_entries_rank_first() {
        let suggestions = suggest(Track::Sozel, 3);
        let turkce = &suggestions["Türkçe"];
        assert!(turkce[0].tags.contains(&"sozel"));

        // Every subject of the track is covered, capped at five entries.
        for (_, entries) in &suggestions {
            assert!(!entries.is_empty());
            assert!(entries.len() <= 5);
        }
    }

    #[test]
    fn difficulty_bucket_follows_level() {
        assert_eq!(difficulty_for_level(1), ResourceLevel::Baslangic);
        assert_eq!(difficulty_for_level(3), ResourceLevel::Orta);
        assert_eq!(difficulty_for_level(5), ResourceLevel::Ileri);
    }

    #[test]
    fn bucket_matches_rank_before_other_difficulties() {
        let suggestions = suggest(Track::Sayisal, 5);
        let matematik = &suggestions["Matematik"];
        // All Matematik entries carry the sayisal tag, so the İleri entry
        // must come first for a strong user.
        assert_eq!(matematik[0].level, ResourceLevel::Ileri);
    }
}
