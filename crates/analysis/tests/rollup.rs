use chunkcache_analysis::{
    aggregate, intelligence_to_chunk_analysis, split_scenes, Analyzer, AnalyzerError,
    ChunkAnalysis, HeuristicAnalyzer, ManuscriptIntelligence,
};

const CHAPTER: &str = "\"Hold the rope,\" Mara said. Ilya held it.\n\
***\n\
At dawn they reached the harbor in Lisbon. Mara slowly counted the boats.\n";

#[tokio::test]
async fn heuristic_scenes_roll_up_into_chapter() {
    let analyzer = HeuristicAnalyzer::new();
    let ranges = analyzer.scene_boundaries(CHAPTER);
    assert_eq!(ranges, split_scenes(CHAPTER));
    assert_eq!(ranges.len(), 2);

    let mut scenes: Vec<ChunkAnalysis> = Vec::new();
    for range in &ranges {
        let text = range.slice(CHAPTER).expect("scene slice");
        let raw = analyzer.analyze(text).await.expect("heuristic never fails");
        scenes.push(intelligence_to_chunk_analysis(&raw));
    }

    let refs: Vec<&ChunkAnalysis> = scenes.iter().collect();
    let chapter = aggregate(&refs);
    let total: usize = scenes.iter().map(|s| s.word_count).sum();

    assert_eq!(chapter.word_count, total);
    assert!(chapter.summary.contains(&format!("{total} words")));
    assert!(chapter.location_names.contains("Lisbon"));
    assert!(chapter.time_markers.contains("dawn"));
    assert!(chapter.dialogue_ratio > 0.0 && chapter.dialogue_ratio < 1.0);
}

struct Refusing;

#[async_trait::async_trait]
impl Analyzer for Refusing {
    async fn analyze(&self, _text: &str) -> chunkcache_analysis::Result<ManuscriptIntelligence> {
        Err(AnalyzerError::unavailable("offline"))
    }
}

#[tokio::test]
async fn custom_analyzer_uses_default_scene_splitting() {
    let analyzer = Refusing;
    assert_eq!(analyzer.scene_boundaries(CHAPTER).len(), 2);
    let err = analyzer.analyze("anything").await.unwrap_err();
    assert_eq!(err.to_string(), "Analyzer unavailable: offline");
}
