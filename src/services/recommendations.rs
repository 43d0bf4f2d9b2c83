use std::collections::HashSet;
use std::sync::Arc;

use crate::{
    cached,
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
    models::{
        dedup_uris, RecommendationResult, RequestContext, Seed, SeedKind, SimilarityCandidate,
        TagRecommendations,
    },
    services::{
        fan_out::fan_out,
        providers::{CatalogProvider, SimilarityProvider},
        resolver::CatalogResolver,
        similarity::{SimilarityAdapter, MAX_CANDIDATES},
        tag_fallback::TagBroadening,
    },
};

/// Tunables for a recommendation run
#[derive(Debug, Clone, Copy)]
pub struct RecommendationSettings {
    /// Catalog searches in flight at once while resolving candidates
    pub resolver_concurrency: usize,
    pub cache_ttl_secs: u64,
}

impl Default for RecommendationSettings {
    fn default() -> Self {
        Self {
            resolver_concurrency: 5,
            cache_ttl_secs: 300,
        }
    }
}

/// Artist and track names a seed stands for
#[derive(Debug, Clone, PartialEq, Eq)]
struct SeedNames {
    artist: String,
    track: String,
}

/// Recommendation orchestrator
///
/// Turns a seed into an ordered, duplicate-free list of catalog track URIs:
/// similarity candidates are gathered, resolved against the catalog in
/// parallel and deduplicated. When the similarity graph has nothing for the
/// seed, the artist's tags are used to broaden the search instead.
#[derive(Clone)]
pub struct RecommendationService {
    similarity: SimilarityAdapter,
    resolver: CatalogResolver,
    fallback: TagBroadening,
    catalog: Arc<dyn CatalogProvider>,
    cache: Option<Cache>,
    settings: RecommendationSettings,
}

impl RecommendationService {
    pub fn new(
        graph: Arc<dyn SimilarityProvider>,
        catalog: Arc<dyn CatalogProvider>,
        cache: Option<Cache>,
        settings: RecommendationSettings,
    ) -> Self {
        let similarity = SimilarityAdapter::new(graph, catalog.clone());
        let resolver = CatalogResolver::new(catalog.clone());
        let fallback = TagBroadening::new(similarity.clone(), resolver.clone());

        Self {
            similarity,
            resolver,
            fallback,
            catalog,
            cache,
            settings,
        }
    }

    /// Runs the full pipeline for `seed`
    ///
    /// Fails before any remote call when the Last.fm key is missing. Results
    /// are cached per seed and access token when a cache is configured.
    pub async fn generate_recommendations(
        &self,
        seed: &Seed,
        ctx: Arc<RequestContext>,
    ) -> AppResult<RecommendationResult> {
        ctx.lastfm_api_key()?;

        match &self.cache {
            Some(cache) if !seed.id.trim().is_empty() => cached!(
                cache,
                CacheKey::recommendations(seed.kind, &seed.id, &ctx.access_token),
                self.settings.cache_ttl_secs,
                self.generate_uncached(seed, ctx.clone())
            ),
            _ => self.generate_uncached(seed, ctx).await,
        }
    }

    /// Standalone tag broadening for `artist`, cached like the main pipeline
    pub async fn improve_recommendations_with_tags(
        &self,
        artist: &str,
        ctx: Arc<RequestContext>,
    ) -> AppResult<TagRecommendations> {
        ctx.lastfm_api_key()?;

        match &self.cache {
            Some(cache) => cached!(
                cache,
                CacheKey::tag_recommendations(artist, &ctx.access_token),
                self.settings.cache_ttl_secs,
                self.fallback.improve_recommendations_with_tags(artist, &ctx)
            ),
            None => self.fallback.improve_recommendations_with_tags(artist, &ctx).await,
        }
    }

    async fn generate_uncached(
        &self,
        seed: &Seed,
        ctx: Arc<RequestContext>,
    ) -> AppResult<RecommendationResult> {
        let names = self.describe_seed(seed, &ctx).await?;
        tracing::info!(
            seed_kind = %seed.kind,
            seed_id = %seed.id,
            artist = %names.artist,
            track = %names.track,
            "Generating recommendations"
        );

        let (candidates, history) = tokio::join!(
            self.candidates(seed.kind, &names, ctx.clone()),
            self.similarity.user_top_tracks(&ctx),
        );
        let candidates = candidates?;

        if candidates.is_empty() {
            if names.artist.trim().is_empty() {
                return Ok(RecommendationResult::default());
            }

            tracing::info!(artist = %names.artist, "No similarity candidates, broadening with tags");
            let uris = self.fallback.broaden(&names.artist, &ctx).await?;
            return Ok(RecommendationResult {
                track_uris: dedup_uris(uris),
                familiar_uris: Vec::new(),
                used_fallback: true,
            });
        }

        let familiar_artists: HashSet<String> = match history {
            Ok(tracks) => tracks
                .into_iter()
                .map(|track| track.artist_name.trim().to_lowercase())
                .filter(|artist| !artist.is_empty())
                .collect(),
            Err(AppError::Cancelled) => return Err(AppError::Cancelled),
            Err(e) => {
                tracing::warn!(error = %e, "User top tracks unavailable, skipping familiarity");
                HashSet::new()
            }
        };

        let resolved = self
            .resolver
            .resolve_all(&candidates, self.settings.resolver_concurrency, ctx.clone())
            .await?;

        let familiar = candidates
            .iter()
            .zip(resolved.iter())
            .filter(|(candidate, _)| {
                familiar_artists.contains(&candidate.artist_name.trim().to_lowercase())
            })
            .filter_map(|(_, uri)| uri.clone());

        let result = RecommendationResult {
            familiar_uris: dedup_uris(familiar),
            track_uris: dedup_uris(resolved.into_iter().flatten()),
            used_fallback: false,
        };

        tracing::info!(
            seed_kind = %seed.kind,
            candidates = candidates.len(),
            resolved = result.track_uris.len(),
            familiar = result.familiar_uris.len(),
            "Recommendations ready"
        );

        Ok(result)
    }

    /// Candidate list for the seed, capped at [`MAX_CANDIDATES`]
    ///
    /// Artist seeds expand every similar artist into its catalog tracks, flattened
    /// in similar-artist order before the cap applies.
    async fn candidates(
        &self,
        kind: SeedKind,
        names: &SeedNames,
        ctx: Arc<RequestContext>,
    ) -> AppResult<Vec<SimilarityCandidate>> {
        match kind {
            SeedKind::Track => {
                self.similarity
                    .similar_tracks(&names.artist, &names.track, &ctx)
                    .await
            }
            SeedKind::Artist => {
                let artists = self.similarity.similar_artists(&names.artist, &ctx).await?;

                let per_artist = fan_out(artists, self.settings.resolver_concurrency, |artist| {
                    let similarity = self.similarity.clone();
                    let ctx = ctx.clone();
                    async move { similarity.top_tracks_for_artist(&artist, &ctx).await }
                })
                .await;

                let mut lists = Vec::with_capacity(per_artist.len());
                for result in per_artist {
                    match result {
                        Ok(Ok(tracks)) => lists.push(tracks),
                        Ok(Err(e)) => return Err(e),
                        Err(e) => tracing::error!(error = %e, "Artist expansion task join error"),
                    }
                }

                Ok(flatten(lists, MAX_CANDIDATES))
            }
        }
    }

    /// Resolves the names behind a seed, asking the catalog for whatever is missing
    async fn describe_seed(&self, seed: &Seed, ctx: &RequestContext) -> AppResult<SeedNames> {
        let given_artist = seed
            .artist_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty());
        let given_name = Some(seed.display_name.trim()).filter(|name| !name.is_empty());

        match seed.kind {
            SeedKind::Track => {
                if let (Some(track), Some(artist)) = (given_name, given_artist) {
                    return Ok(SeedNames {
                        artist: artist.to_string(),
                        track: track.to_string(),
                    });
                }

                require_seed_id(seed)?;
                let track = self
                    .catalog
                    .track(&seed.id, ctx)
                    .await?
                    .ok_or_else(|| unknown_seed(seed))?;
                Ok(SeedNames {
                    artist: given_artist
                        .map(str::to_string)
                        .unwrap_or_else(|| track.primary_artist().to_string()),
                    track: track.name,
                })
            }
            SeedKind::Artist => {
                if let Some(artist) = given_artist.or(given_name) {
                    return Ok(SeedNames {
                        artist: artist.to_string(),
                        track: String::new(),
                    });
                }

                require_seed_id(seed)?;
                let artist = self
                    .catalog
                    .artist(&seed.id, ctx)
                    .await?
                    .ok_or_else(|| unknown_seed(seed))?;
                Ok(SeedNames {
                    artist: artist.name,
                    track: String::new(),
                })
            }
        }
    }
}

fn require_seed_id(seed: &Seed) -> AppResult<()> {
    if seed.id.trim().is_empty() {
        return Err(AppError::InvalidInput(format!(
            "{} seed needs an id or a name",
            seed.kind
        )));
    }
    Ok(())
}

fn unknown_seed(seed: &Seed) -> AppError {
    AppError::InvalidInput(format!("Unknown {} seed: {}", seed.kind, seed.id))
}

/// Per-artist lists concatenated in order, truncated to `limit`
fn flatten(lists: Vec<Vec<SimilarityCandidate>>, limit: usize) -> Vec<SimilarityCandidate> {
    let mut flat: Vec<_> = lists.into_iter().flatten().collect();
    flat.truncate(limit);
    flat
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_redis_client;
    use crate::models::spotify::{CatalogArtist, CatalogArtistRef, CatalogTrack};
    use crate::models::{Tag, TrackUri};
    use crate::services::providers::{MockCatalogProvider, MockSimilarityProvider};
    use tokio_util::sync::CancellationToken;

    fn ctx() -> Arc<RequestContext> {
        Arc::new(RequestContext::new(
            "token".into(),
            None,
            Some("key".into()),
            CancellationToken::new(),
        ))
    }

    fn hit(uri: &str) -> CatalogTrack {
        CatalogTrack {
            id: None,
            uri: uri.to_string(),
            name: "hit".to_string(),
            artists: Vec::new(),
        }
    }

    fn catalog_track(name: &str, artist: &str) -> CatalogTrack {
        CatalogTrack {
            id: Some(format!("{}-id", name)),
            uri: format!("spotify:track:{}", name),
            name: name.to_string(),
            artists: vec![CatalogArtistRef {
                id: None,
                name: artist.to_string(),
            }],
        }
    }

    fn uri(id: &str) -> TrackUri {
        TrackUri::parse(&format!("spotify:track:{}", id)).unwrap()
    }

    fn service(graph: MockSimilarityProvider, catalog: MockCatalogProvider) -> RecommendationService {
        RecommendationService::new(
            Arc::new(graph),
            Arc::new(catalog),
            None,
            RecommendationSettings::default(),
        )
    }

    fn no_history(catalog: &mut MockCatalogProvider) {
        catalog.expect_user_top_tracks().returning(|_| Ok(Vec::new()));
    }

    #[tokio::test]
    async fn test_track_seed_end_to_end() {
        let mut graph = MockSimilarityProvider::new();
        graph
            .expect_similar_tracks()
            .withf(|artist, track, _| artist == "Eminem" && track == "Lose Yourself")
            .times(1)
            .returning(|_, _, _| {
                Ok(vec![
                    SimilarityCandidate::new("50 Cent", "In Da Club"),
                    SimilarityCandidate::new("Dr. Dre", "Still D.R.E."),
                ])
            });
        graph.expect_top_tags().times(0);

        let mut catalog = MockCatalogProvider::new();
        no_history(&mut catalog);
        catalog
            .expect_search_tracks()
            .times(2)
            .returning(|query, _, _| match query {
                "In Da Club 50 Cent" => Ok(vec![hit("spotify:track:X")]),
                "Still D.R.E. Dr. Dre" => Ok(vec![hit("spotify:track:Y")]),
                other => panic!("unexpected query {}", other),
            });

        let seed = Seed::track("lose-yourself", "Lose Yourself", "Eminem");
        let result = service(graph, catalog)
            .generate_recommendations(&seed, ctx())
            .await
            .unwrap();

        assert_eq!(result.track_uris, vec![uri("X"), uri("Y")]);
        assert!(!result.used_fallback);
    }

    #[tokio::test]
    async fn test_unreachable_cache_falls_through_to_pipeline() {
        let mut graph = MockSimilarityProvider::new();
        graph
            .expect_similar_tracks()
            .times(1)
            .returning(|_, _, _| Ok(vec![SimilarityCandidate::new("50 Cent", "In Da Club")]));

        let mut catalog = MockCatalogProvider::new();
        no_history(&mut catalog);
        catalog
            .expect_search_tracks()
            .times(1)
            .returning(|_, _, _| Ok(vec![hit("spotify:track:X")]));

        // Nothing listens on port 1, so every cache read fails
        let client = create_redis_client("redis://127.0.0.1:1/").unwrap();
        let (cache, writer) = Cache::new(client);
        let service = RecommendationService::new(
            Arc::new(graph),
            Arc::new(catalog),
            Some(cache),
            RecommendationSettings::default(),
        );

        let seed = Seed::track("lose-yourself", "Lose Yourself", "Eminem");
        let result = tokio_test::assert_ok!(service.generate_recommendations(&seed, ctx()).await);
        assert_eq!(result.track_uris, vec![uri("X")]);

        drop(service);
        writer.shutdown().await;
    }

    #[tokio::test]
    async fn test_duplicates_removed_first_occurrence_wins() {
        let mut graph = MockSimilarityProvider::new();
        graph.expect_similar_tracks().returning(|_, _, _| {
            Ok(vec![
                SimilarityCandidate::new("A", "One"),
                SimilarityCandidate::new("B", "Two"),
                SimilarityCandidate::new("A", "One (Remastered)"),
            ])
        });

        let mut catalog = MockCatalogProvider::new();
        no_history(&mut catalog);
        catalog
            .expect_search_tracks()
            .times(3)
            .returning(|query, _, _| match query {
                "Two B" => Ok(vec![hit("spotify:track:2")]),
                _ => Ok(vec![hit("spotify:track:1")]),
            });

        let result = service(graph, catalog)
            .generate_recommendations(&Seed::track("id", "One", "A"), ctx())
            .await
            .unwrap();
        assert_eq!(result.track_uris, vec![uri("1"), uri("2")]);
    }

    #[tokio::test]
    async fn test_empty_candidates_trigger_tag_fallback_once() {
        let mut graph = MockSimilarityProvider::new();
        graph
            .expect_similar_tracks()
            .times(1)
            .returning(|_, _, _| Ok(Vec::new()));
        graph
            .expect_top_tags()
            .withf(|artist, _| artist == "Obscure Artist")
            .times(1)
            .returning(|_, _| {
                Ok(vec![
                    Tag { name: "lo-fi".to_string() },
                    Tag { name: "bedroom pop".to_string() },
                ])
            });

        let mut catalog = MockCatalogProvider::new();
        no_history(&mut catalog);
        catalog
            .expect_search_tracks()
            .times(2)
            .returning(|query, _, _| match query {
                "Obscure Artist lo-fi" => Ok(vec![hit("spotify:track:T")]),
                "Obscure Artist bedroom pop" => Ok(vec![hit("spotify:track:T")]),
                other => panic!("unexpected query {}", other),
            });

        let result = service(graph, catalog)
            .generate_recommendations(&Seed::track("id", "Demo", "Obscure Artist"), ctx())
            .await
            .unwrap();

        assert_eq!(result.track_uris, vec![uri("T")]);
        assert!(result.used_fallback);
        assert!(result.familiar_uris.is_empty());
    }

    #[tokio::test]
    async fn test_unresolvable_candidates_do_not_trigger_fallback() {
        let mut graph = MockSimilarityProvider::new();
        graph
            .expect_similar_tracks()
            .returning(|_, _, _| Ok(vec![SimilarityCandidate::new("Nobody", "Nothing")]));
        graph.expect_top_tags().times(0);

        let mut catalog = MockCatalogProvider::new();
        no_history(&mut catalog);
        catalog
            .expect_search_tracks()
            .times(1)
            .returning(|_, _, _| Ok(Vec::new()));

        let result = service(graph, catalog)
            .generate_recommendations(&Seed::track("id", "Demo", "Somebody"), ctx())
            .await
            .unwrap();

        assert!(result.is_empty());
        assert!(!result.used_fallback);
    }

    #[tokio::test]
    async fn test_artist_seed_flattens_similar_artists() {
        let mut graph = MockSimilarityProvider::new();
        graph
            .expect_similar_artists()
            .withf(|artist, _| artist == "Eminem")
            .times(1)
            .returning(|_, _| Ok(vec!["D12".to_string(), "50 Cent".to_string()]));

        let mut catalog = MockCatalogProvider::new();
        no_history(&mut catalog);
        catalog
            .expect_search_tracks()
            .withf(|_, limit, _| *limit == 10)
            .returning(|query, _, _| match query {
                "D12" => Ok(vec![
                    catalog_track("D12 Song 0", "D12"),
                    catalog_track("D12 Song 1", "D12"),
                ]),
                "50 Cent" => Ok(vec![catalog_track("In Da Club", "50 Cent")]),
                other => panic!("unexpected expansion query {}", other),
            });
        catalog
            .expect_search_tracks()
            .withf(|_, limit, _| *limit == 1)
            .times(3)
            .returning(|query, _, _| match query {
                "D12 Song 0 D12" => Ok(vec![hit("spotify:track:d0")]),
                "D12 Song 1 D12" => Ok(vec![hit("spotify:track:d1")]),
                "In Da Club 50 Cent" => Ok(vec![hit("spotify:track:c0")]),
                other => panic!("unexpected resolve query {}", other),
            });

        let result = service(graph, catalog)
            .generate_recommendations(&Seed::artist("eminem-id", "Eminem"), ctx())
            .await
            .unwrap();

        assert_eq!(result.track_uris, vec![uri("d0"), uri("d1"), uri("c0")]);
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_before_remote_calls() {
        let mut graph = MockSimilarityProvider::new();
        graph.expect_similar_tracks().times(0);
        let mut catalog = MockCatalogProvider::new();
        catalog.expect_user_top_tracks().times(0);
        catalog.expect_search_tracks().times(0);

        let ctx = Arc::new(RequestContext::new(
            "token".into(),
            None,
            None,
            CancellationToken::new(),
        ));
        let result = service(graph, catalog)
            .generate_recommendations(&Seed::track("id", "Stan", "Eminem"), ctx)
            .await;

        assert!(matches!(result, Err(AppError::ConfigurationMissing(_))));
    }

    #[tokio::test]
    async fn test_primary_similarity_failure_propagates() {
        let mut graph = MockSimilarityProvider::new();
        graph.expect_similar_tracks().returning(|_, _, _| {
            Err(AppError::Upstream {
                service: "lastfm",
                status: 500,
                body: String::new(),
            })
        });
        graph.expect_top_tags().times(0);

        let mut catalog = MockCatalogProvider::new();
        no_history(&mut catalog);

        let result = service(graph, catalog)
            .generate_recommendations(&Seed::track("id", "Stan", "Eminem"), ctx())
            .await;
        assert!(matches!(result, Err(AppError::Upstream { status: 500, .. })));
    }

    #[tokio::test]
    async fn test_history_failure_is_ignored_and_familiar_uris_marked() {
        let mut graph = MockSimilarityProvider::new();
        graph.expect_similar_tracks().returning(|_, _, _| {
            Ok(vec![
                SimilarityCandidate::new("D12", "My Band"),
                SimilarityCandidate::new("Dr. Dre", "Forgot About Dre"),
            ])
        });

        let mut catalog = MockCatalogProvider::new();
        catalog
            .expect_user_top_tracks()
            .times(1)
            .returning(|_| Ok(vec![catalog_track("The Next Episode", "dr. dre")]));
        catalog
            .expect_search_tracks()
            .returning(|query, _, _| match query {
                "My Band D12" => Ok(vec![hit("spotify:track:band")]),
                _ => Ok(vec![hit("spotify:track:dre")]),
            });

        let result = service(graph, catalog)
            .generate_recommendations(&Seed::track("id", "Stan", "Eminem"), ctx())
            .await
            .unwrap();
        assert_eq!(result.track_uris, vec![uri("band"), uri("dre")]);
        assert_eq!(result.familiar_uris, vec![uri("dre")]);

        let mut graph = MockSimilarityProvider::new();
        graph
            .expect_similar_tracks()
            .returning(|_, _, _| Ok(vec![SimilarityCandidate::new("D12", "My Band")]));
        let mut catalog = MockCatalogProvider::new();
        catalog.expect_user_top_tracks().returning(|_| {
            Err(AppError::Upstream {
                service: "spotify",
                status: 403,
                body: "Insufficient client scope".to_string(),
            })
        });
        catalog
            .expect_search_tracks()
            .returning(|_, _, _| Ok(vec![hit("spotify:track:band")]));

        let result = service(graph, catalog)
            .generate_recommendations(&Seed::track("id", "Stan", "Eminem"), ctx())
            .await
            .unwrap();
        assert_eq!(result.track_uris, vec![uri("band")]);
        assert!(result.familiar_uris.is_empty());
    }

    #[tokio::test]
    async fn test_seed_names_looked_up_when_missing() {
        let mut graph = MockSimilarityProvider::new();
        graph
            .expect_similar_tracks()
            .withf(|artist, track, _| artist == "Eminem" && track == "Stan")
            .times(1)
            .returning(|_, _, _| Ok(Vec::new()));
        graph.expect_top_tags().returning(|_, _| Ok(Vec::new()));

        let mut catalog = MockCatalogProvider::new();
        no_history(&mut catalog);
        catalog
            .expect_track()
            .withf(|id, _| id == "stan-id")
            .times(1)
            .returning(|_, _| Ok(Some(catalog_track("Stan", "Eminem"))));

        let seed = Seed {
            kind: SeedKind::Track,
            id: "stan-id".to_string(),
            display_name: String::new(),
            artist_name: None,
        };
        let result = service(graph, catalog)
            .generate_recommendations(&seed, ctx())
            .await
            .unwrap();
        assert!(result.is_empty());
        assert!(result.used_fallback);
    }

    #[tokio::test]
    async fn test_unknown_artist_seed_is_invalid_input() {
        let mut catalog = MockCatalogProvider::new();
        catalog.expect_artist().times(1).returning(|_, _| Ok(None::<CatalogArtist>));

        let seed = Seed {
            kind: SeedKind::Artist,
            id: "missing".to_string(),
            display_name: String::new(),
            artist_name: None,
        };
        let result = service(MockSimilarityProvider::new(), catalog)
            .generate_recommendations(&seed, ctx())
            .await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_flatten_keeps_artist_order_and_caps() {
        let list = |artist: &str, n: usize| {
            (0..n)
                .map(|i| SimilarityCandidate::new(artist, format!("{}{}", artist, i)))
                .collect::<Vec<_>>()
        };

        let merged = flatten(vec![list("a", 3), list("b", 1), list("c", 2)], 30);
        let names: Vec<&str> = merged.iter().map(|c| c.track_name.as_str()).collect();
        assert_eq!(names, vec!["a0", "a1", "a2", "b0", "c0", "c1"]);

        let capped = flatten((0..10).map(|i| list(&i.to_string(), 10)).collect(), MAX_CANDIDATES);
        assert_eq!(capped.len(), MAX_CANDIDATES);
        assert_eq!(capped[10].track_name, "10");
        assert_eq!(capped[MAX_CANDIDATES - 1].track_name, "29");
    }
}
