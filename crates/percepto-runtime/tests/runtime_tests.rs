#[cfg(test)]
mod tests {
    use percepto_config::PerceptoConfig;
    use percepto_core::{PerceptoError, RouteKind};
    use percepto_llm::{MockEmbedding, MockProvider};
    use percepto_memory::{InteractionCounter, MemoryKind, MemoryRecord, RecordFilter};
    use percepto_runtime::*;
    use percepto_tools::{MockRetriever, ToolSet};
    use std::sync::Arc;

    fn setup(llm: &Arc<MockProvider>, embedder: &Arc<MockEmbedding>) -> AssistantContext {
        build_test_context(PerceptoConfig::default(), llm.clone(), embedder.clone()).unwrap()
    }

    fn embedder() -> Arc<MockEmbedding> {
        Arc::new(MockEmbedding::new(vec![1.0, 0.0, 0.0]))
    }

    fn prompt_of(llm: &MockProvider, call: usize) -> String {
        llm.recorded_requests()[call].messages[0].content.clone()
    }

    // ── Router ─────────────────────────────────────────────────

    mod router {
        use super::*;

        #[tokio::test]
        async fn test_tool_keyword_invokes_only_that_retriever() {
            let weather = Arc::new(MockRetriever::answering(
                RouteKind::Weather,
                "Sunny in Paris",
                "https://www.weatherapi.com/",
            ));
            let search = Arc::new(MockRetriever::answering(RouteKind::WebSearch, "x", ""));
            let tools = ToolSet::new().with(weather.clone()).with(search.clone());

            let decision = route("use_weather_tool", "weather in paris?", &tools).await;
            assert_eq!(decision.kind, RouteKind::Weather);
            assert_eq!(decision.payload, "Sunny in Paris");
            assert_eq!(decision.source_url.as_deref(), Some("https://www.weatherapi.com/"));
            assert_eq!(weather.queries(), vec!["weather in paris?"]);
            assert!(search.queries().is_empty());
        }

        #[tokio::test]
        async fn test_empty_url_means_no_source() {
            let tools = ToolSet::new().with(Arc::new(MockRetriever::answering(
                RouteKind::Location,
                "Based on your location, you are at Home.",
                "",
            )));
            let decision = route("  USE_LOCATION_TOOL", "where am i", &tools).await;
            assert_eq!(decision.kind, RouteKind::Location);
            assert_eq!(decision.source_url, None);
        }

        #[tokio::test]
        async fn test_failing_tool_yields_apology() {
            let tools = ToolSet::new().with(Arc::new(MockRetriever::failing(RouteKind::DateTime, "timeout")));
            let decision = route("use_datetime_tool", "what time is it", &tools).await;
            assert_eq!(decision.kind, RouteKind::DateTime);
            assert_eq!(decision.payload, TOOL_FAILURE_REPLY);
            assert_eq!(decision.source_url, None);
        }

        #[tokio::test]
        async fn test_unconnected_tool_yields_apology() {
            let decision = route("use_web_search_tool", "who won", &ToolSet::new()).await;
            assert_eq!(decision.kind, RouteKind::WebSearch);
            assert_eq!(decision.payload, TOOL_FAILURE_REPLY);
        }

        #[tokio::test]
        async fn test_blank_answer_yields_apology() {
            let tools = ToolSet::new().with(Arc::new(MockRetriever::answering(
                RouteKind::Weather,
                "   ",
                "https://www.weatherapi.com/",
            )));
            let decision = route("use_weather_tool", "weather", &tools).await;
            assert_eq!(decision.payload, TOOL_FAILURE_REPLY);
            assert_eq!(decision.source_url, None);
        }

        #[tokio::test]
        async fn test_question_does_not_touch_tools() {
            let weather = Arc::new(MockRetriever::answering(RouteKind::Weather, "x", ""));
            let tools = ToolSet::new().with(weather.clone());
            let decision = route("question: It's 20 degrees.", "weather?", &tools).await;
            assert_eq!(decision.kind, RouteKind::Question);
            assert_eq!(decision.payload, "It's 20 degrees.");
            assert!(weather.queries().is_empty());
        }
    }

    // ── Query pipeline ─────────────────────────────────────────

    mod pipeline {
        use super::*;

        #[tokio::test]
        async fn test_question_answers_without_writing() {
            let llm = Arc::new(MockProvider::new("mock").with_response("Question: Your sister is Mona."));
            let embedder = embedder();
            let ctx = setup(&llm, &embedder);
            let pipeline = QueryPipeline::new(ctx.clone());

            let response = pipeline.process_query("who is my sister?").await.unwrap();
            assert_eq!(response.answer, "Your sister is Mona.");
            assert_eq!(response.route_kind, RouteKind::Question);
            assert_eq!(response.source_url, None);
            assert_eq!(ctx.memory.count(RecordFilter::Any).unwrap(), 0);
        }

        #[tokio::test]
        async fn test_prompt_carries_retrieved_context() {
            let llm = Arc::new(MockProvider::new("mock").with_response("question: Mona."));
            let embedder = embedder();
            let ctx = setup(&llm, &embedder);
            ctx.memory
                .insert(&MemoryRecord::new("Ahmed's sister is Mona", vec![1.0, 0.0, 0.0], MemoryKind::Fact))
                .unwrap();

            QueryPipeline::new(ctx).process_query("who is my sister?").await.unwrap();
            let prompt = prompt_of(&llm, 0);
            assert!(prompt.contains("Ahmed's sister is Mona"));
            assert!(prompt.contains("Current Query: who is my sister?"));
            assert!(prompt.contains("assistant for Ahmed"));
        }

        #[tokio::test]
        async fn test_retrieval_is_limited_to_top_k() {
            let llm = Arc::new(MockProvider::new("mock").with_response("question: ok"));
            let embedder = embedder();
            let mut config = PerceptoConfig::default();
            config.memory.top_k = 2;
            let ctx = build_test_context(config, llm.clone(), embedder.clone()).unwrap();
            for (content, v) in [
                ("close fact", vec![1.0, 0.1, 0.0]),
                ("closer fact", vec![1.0, 0.0, 0.0]),
                ("far fact", vec![0.0, 1.0, 0.0]),
            ] {
                ctx.memory.insert(&MemoryRecord::new(content, v, MemoryKind::Fact)).unwrap();
            }

            QueryPipeline::new(ctx).process_query("anything").await.unwrap();
            let prompt = prompt_of(&llm, 0);
            assert!(prompt.contains("closer fact"));
            assert!(prompt.contains("close fact"));
            assert!(!prompt.contains("far fact"));
        }

        #[tokio::test]
        async fn test_statement_is_remembered() {
            let llm = Arc::new(MockProvider::new("mock").with_response("statement: Got it, you like tea!"));
            let embedder = embedder();
            let ctx = setup(&llm, &embedder);

            let response = QueryPipeline::new(ctx.clone())
                .process_query("I like tea")
                .await
                .unwrap();
            assert_eq!(response.route_kind, RouteKind::Statement);
            assert_eq!(response.answer, "Got it, you like tea!");

            let stored = ctx.memory.bulk_fetch(RecordFilter::Any).unwrap();
            assert_eq!(stored.len(), 1);
            assert_eq!(stored[0].kind, MemoryKind::Conversation);
            assert!(stored[0].content.starts_with("Ahmed: I like tea\n\nStatement Date: "));
            // The stored content is embedded fresh, not the bare query.
            assert_eq!(embedder.embedded_texts()[1], stored[0].content);
        }

        #[tokio::test]
        async fn test_tool_route_through_pipeline() {
            let llm = Arc::new(MockProvider::new("mock").with_response("use_weather_tool"));
            let embedder = embedder();
            let weather = Arc::new(MockRetriever::answering(
                RouteKind::Weather,
                "It is sunny.",
                "https://www.weatherapi.com/",
            ));
            let mut ctx = setup(&llm, &embedder);
            ctx.tools = ToolSet::new().with(weather.clone());

            let response = QueryPipeline::new(ctx.clone())
                .process_query("what's the weather in cairo")
                .await
                .unwrap();
            assert_eq!(response.answer, "It is sunny.");
            assert_eq!(response.route_kind, RouteKind::Weather);
            assert_eq!(weather.queries(), vec!["what's the weather in cairo"]);
            assert_eq!(ctx.memory.count(RecordFilter::Any).unwrap(), 0);
        }

        #[tokio::test]
        async fn test_embedding_failure_is_fatal() {
            let llm = Arc::new(MockProvider::new("mock").with_response("question: never"));
            let embedder = Arc::new(MockEmbedding::new(vec![1.0]).failing_on("boom"));
            let ctx = setup(&llm, &embedder);

            let err = QueryPipeline::new(ctx).process_query("boom").await.unwrap_err();
            assert!(matches!(err, PerceptoError::Embedding(_)));
            assert_eq!(llm.call_count(), 0);
        }

        #[tokio::test]
        async fn test_llm_failure_is_fatal() {
            let llm = Arc::new(MockProvider::new("mock").with_error("HTTP 500"));
            let embedder = embedder();
            let ctx = setup(&llm, &embedder);

            let err = QueryPipeline::new(ctx).process_query("hello").await.unwrap_err();
            assert!(matches!(err, PerceptoError::LlmProvider(_)));
        }

        #[tokio::test]
        async fn test_unknown_reply_passes_through() {
            let llm = Arc::new(MockProvider::new("mock").with_response("Sorry, I am not sure."));
            let embedder = embedder();
            let ctx = setup(&llm, &embedder);

            let response = QueryPipeline::new(ctx).process_query("hmm").await.unwrap();
            assert_eq!(response.route_kind, RouteKind::Unknown);
            assert_eq!(response.answer, "Sorry, I am not sure.");
        }
    }

    // ── Consolidation ──────────────────────────────────────────

    mod consolidation {
        use super::*;
        use async_trait::async_trait;
        use percepto_core::{Message, Result};
        use percepto_llm::{LlmProvider, LlmRequest, LlmResponse, StopReason, Usage};
        use tokio::sync::Notify;

        fn bump_counter(ctx: &AssistantContext, times: usize) {
            for i in 0..times {
                ctx.transcripts
                    .save_message(&format!("q{i}"), "a", None, None)
                    .unwrap();
            }
        }

        fn insert(ctx: &AssistantContext, content: &str, v: Vec<f32>, kind: MemoryKind) -> MemoryRecord {
            let record = MemoryRecord::new(content, v, kind);
            ctx.memory.insert(&record).unwrap();
            record
        }

        #[tokio::test]
        async fn test_below_threshold_is_noop() {
            let llm = Arc::new(MockProvider::new("mock"));
            let embedder = embedder();
            let ctx = setup(&llm, &embedder);
            insert(&ctx, "a", vec![1.0, 0.0, 0.0], MemoryKind::Fact);
            let engine = ConsolidationEngine::new(ctx.clone());

            assert_eq!(engine.trigger(19, 20).await, ConsolidationOutcome::BelowThreshold);
            assert_eq!(llm.call_count(), 0);
            assert_eq!(ctx.memory.count(RecordFilter::Only(MemoryKind::Fact)).unwrap(), 1);
        }

        #[tokio::test]
        async fn test_nothing_to_summarize_leaves_state() {
            let llm = Arc::new(MockProvider::new("mock"));
            let embedder = embedder();
            let ctx = setup(&llm, &embedder);
            let summary = insert(&ctx, "old summary", vec![0.0, 0.0, 1.0], MemoryKind::Summary);
            bump_counter(&ctx, 3);
            let engine = ConsolidationEngine::new(ctx.clone());

            assert_eq!(engine.trigger(20, 20).await, ConsolidationOutcome::NothingToSummarize);
            assert_eq!(ctx.memory.bulk_fetch(RecordFilter::Any).unwrap(), vec![summary]);
            assert_eq!(ctx.transcripts.count().unwrap(), 3);
            assert_eq!(llm.call_count(), 0);
        }

        #[tokio::test]
        async fn test_rebuild_replaces_records_with_summaries() {
            let llm = Arc::new(
                MockProvider::new("mock")
                    .with_response("Ahmed likes tea and coffee.")
                    .with_response("Ahmed lives in Cairo."),
            );
            let embedder = Arc::new(MockEmbedding::new(vec![0.0, 0.0, 1.0]));
            let ctx = setup(&llm, &embedder);

            let old = insert(&ctx, "old summary", vec![0.0, 0.0, 1.0], MemoryKind::Summary);
            insert(&ctx, "likes tea", vec![1.0, 0.0, 0.0], MemoryKind::Fact);
            insert(&ctx, "likes coffee", vec![0.9, 0.435_889_9, 0.0], MemoryKind::Conversation);
            insert(&ctx, "lives in Cairo", vec![0.0, -1.0, 0.0], MemoryKind::Conversation);
            bump_counter(&ctx, 20);

            let engine = ConsolidationEngine::new(ctx.clone());
            let outcome = engine.trigger(20, 20).await;
            assert_eq!(
                outcome,
                ConsolidationOutcome::Rebuilt(ConsolidationReport {
                    records_summarized: 3,
                    clusters: 2,
                    summaries_kept: 1,
                    summaries_added: 2,
                })
            );
            assert_eq!(engine.state(), ConsolidationState::Idle);

            let all = ctx.memory.bulk_fetch(RecordFilter::Any).unwrap();
            assert_eq!(all.len(), 3);
            assert!(all.iter().all(|r| r.kind == MemoryKind::Summary));
            let kept = all.iter().find(|r| r.id == old.id).unwrap();
            assert_eq!(kept, &old);
            let contents: Vec<&str> = all.iter().map(|r| r.content.as_str()).collect();
            assert!(contents.contains(&"Ahmed likes tea and coffee."));
            assert!(contents.contains(&"Ahmed lives in Cairo."));

            assert!(prompt_of(&llm, 0).contains("likes tea\n\nlikes coffee"));
            assert!(prompt_of(&llm, 1).contains("lives in Cairo"));
            assert_eq!(ctx.transcripts.count().unwrap(), 0);
        }

        #[tokio::test]
        async fn test_summary_failure_leaves_store_and_counter() {
            let llm = Arc::new(MockProvider::new("mock").with_error("HTTP 503"));
            let embedder = embedder();
            let ctx = setup(&llm, &embedder);
            let fact = insert(&ctx, "likes tea", vec![1.0, 0.0, 0.0], MemoryKind::Fact);
            bump_counter(&ctx, 2);

            let engine = ConsolidationEngine::new(ctx.clone());
            let outcome = engine.trigger(2, 2).await;
            assert!(matches!(outcome, ConsolidationOutcome::Failed(_)));
            assert_eq!(ctx.memory.bulk_fetch(RecordFilter::Any).unwrap(), vec![fact]);
            assert_eq!(ctx.transcripts.count().unwrap(), 2);
            assert_eq!(engine.state(), ConsolidationState::Idle);
        }

        #[tokio::test]
        async fn test_embedding_failure_abandons_rebuild() {
            let llm = Arc::new(MockProvider::new("mock").with_response("broken summary"));
            let embedder = Arc::new(MockEmbedding::new(vec![1.0, 0.0, 0.0]).failing_on("broken"));
            let ctx = setup(&llm, &embedder);
            insert(&ctx, "likes tea", vec![1.0, 0.0, 0.0], MemoryKind::Fact);

            let engine = ConsolidationEngine::new(ctx.clone());
            assert!(matches!(engine.consolidate().await, ConsolidationOutcome::Failed(_)));
            let all = ctx.memory.bulk_fetch(RecordFilter::Any).unwrap();
            assert_eq!(all.len(), 1);
            assert_eq!(all[0].kind, MemoryKind::Fact);
        }

        /// Blocks every completion until released.
        struct GatedProvider {
            entered: Arc<Notify>,
            release: Arc<Notify>,
        }

        #[async_trait]
        impl LlmProvider for GatedProvider {
            fn name(&self) -> &str {
                "gated"
            }

            async fn complete(&self, _request: &LlmRequest) -> Result<LlmResponse> {
                self.entered.notify_one();
                self.release.notified().await;
                Ok(LlmResponse {
                    message: Message::assistant("Gated summary."),
                    usage: Usage::default(),
                    stop_reason: StopReason::EndTurn,
                })
            }

            async fn health_check(&self) -> Result<()> {
                Ok(())
            }
        }

        #[tokio::test]
        async fn test_concurrent_trigger_is_rejected_and_late_records_survive() {
            let entered = Arc::new(Notify::new());
            let release = Arc::new(Notify::new());
            let llm = Arc::new(GatedProvider {
                entered: entered.clone(),
                release: release.clone(),
            });
            let ctx = build_test_context(PerceptoConfig::default(), llm, embedder()).unwrap();
            insert(&ctx, "likes tea", vec![1.0, 0.0, 0.0], MemoryKind::Fact);

            let engine = Arc::new(ConsolidationEngine::new(ctx.clone()));
            let running = {
                let engine = engine.clone();
                tokio::spawn(async move { engine.consolidate().await })
            };

            entered.notified().await;
            assert_eq!(engine.state(), ConsolidationState::Summarizing);
            assert_eq!(engine.trigger(50, 20).await, ConsolidationOutcome::AlreadyRunning);

            // Arrives while the summary is being written.
            let late = insert(&ctx, "new statement", vec![1.0, 0.0, 0.0], MemoryKind::Conversation);
            release.notify_one();

            let outcome = running.await.unwrap();
            assert!(matches!(outcome, ConsolidationOutcome::Rebuilt(_)));

            let all = ctx.memory.bulk_fetch(RecordFilter::Any).unwrap();
            assert_eq!(all.len(), 2);
            assert!(all.iter().any(|r| r.kind == MemoryKind::Summary && r.content == "Gated summary."));
            assert!(all.contains(&late));
        }
    }

    // ── Assistant ──────────────────────────────────────────────

    mod assistant {
        use super::*;

        #[tokio::test]
        async fn test_first_interaction_starts_titled_conversation() {
            let llm = Arc::new(
                MockProvider::new("mock")
                    .with_response("question: Hello Ahmed!")
                    .with_response("\"Friendly greeting\""),
            );
            let embedder = embedder();
            let assistant = Assistant::new(setup(&llm, &embedder));

            let interaction = assistant.handle("hi", ConversationTarget::Latest).await.unwrap();
            assert!(interaction.new_conversation);
            assert_eq!(interaction.interaction_count, 1);
            assert_eq!(interaction.response.answer, "Hello Ahmed!");

            assistant.wait_background().await;
            let transcripts = &assistant.context().transcripts;
            let conversation = transcripts.conversation(interaction.conversation_id).unwrap().unwrap();
            assert_eq!(conversation.title.as_deref(), Some("Friendly greeting"));
            assert_eq!(conversation.message_count, 1);
        }

        #[tokio::test]
        async fn test_source_url_is_saved_with_answer() {
            let llm = Arc::new(MockProvider::new("mock").with_response("use_weather_tool"));
            let embedder = embedder();
            let mut ctx = setup(&llm, &embedder);
            ctx.tools = ToolSet::new().with(Arc::new(MockRetriever::answering(
                RouteKind::Weather,
                "It is sunny.",
                "https://www.weatherapi.com/",
            )));
            let conversation = ctx.transcripts.create_conversation().unwrap();
            let assistant = Assistant::new(ctx);

            let interaction = assistant
                .handle("weather?", ConversationTarget::Existing(conversation))
                .await
                .unwrap();
            assert!(!interaction.new_conversation);
            assistant.wait_background().await;

            let messages = assistant.context().transcripts.messages(conversation, 100).unwrap();
            assert_eq!(messages.len(), 1);
            assert_eq!(
                messages[0].ai_response,
                "It is sunny.\n\nSources Links: https://www.weatherapi.com/"
            );
        }

        #[tokio::test]
        async fn test_reaching_threshold_consolidates_in_background() {
            let llm = Arc::new(
                MockProvider::new("mock")
                    .with_response("statement: Noted.")
                    .with_response("statement: Noted again.")
                    .with_response("Ahmed likes tea and coffee."),
            );
            let embedder = embedder();
            let mut config = PerceptoConfig::default();
            config.memory.consolidation_threshold = 2;
            let ctx = build_test_context(config, llm.clone(), embedder.clone()).unwrap();
            let conversation = ctx.transcripts.create_conversation().unwrap();
            let assistant = Assistant::new(ctx);
            let target = ConversationTarget::Existing(conversation);

            assistant.handle("I like tea", target).await.unwrap();
            assistant.wait_background().await;
            let memory = &assistant.context().memory;
            assert_eq!(memory.count(RecordFilter::Only(MemoryKind::Conversation)).unwrap(), 1);

            let second = assistant.handle("I like coffee", target).await.unwrap();
            assert_eq!(second.interaction_count, 2);
            assistant.wait_background().await;

            let all = memory.bulk_fetch(RecordFilter::Any).unwrap();
            assert_eq!(all.len(), 1);
            assert_eq!(all[0].kind, MemoryKind::Summary);
            assert_eq!(all[0].content, "Ahmed likes tea and coffee.");
            assert_eq!(assistant.context().transcripts.count().unwrap(), 0);
        }

        #[tokio::test]
        async fn test_failed_query_is_not_saved() {
            let llm = Arc::new(MockProvider::new("mock").with_error("HTTP 401"));
            let embedder = embedder();
            let assistant = Assistant::new(setup(&llm, &embedder));

            assert!(assistant.handle("hi", ConversationTarget::New).await.is_err());
            assert!(assistant.context().transcripts.list_conversations().unwrap().is_empty());
            assert_eq!(assistant.context().transcripts.count().unwrap(), 0);
        }

        #[tokio::test]
        async fn test_context_from_config_persists_memory() {
            let dir = tempfile::tempdir().unwrap();
            let mut config = PerceptoConfig::default();
            config.services.openai_api_key = Some("sk-test".into());
            config.memory.db_path = dir.path().join("data").join("memory.db");

            let ctx = AssistantContext::from_config(config.clone()).unwrap();
            ctx.memory
                .insert(&MemoryRecord::new("likes tea", vec![1.0, 0.0], MemoryKind::Fact))
                .unwrap();
            ctx.transcripts.save_message("q", "a", None, None).unwrap();
            drop(ctx);

            let reopened = AssistantContext::from_config(config).unwrap();
            assert_eq!(reopened.memory.count(RecordFilter::Any).unwrap(), 1);
            assert_eq!(reopened.transcripts.count().unwrap(), 1);
            assert!(reopened.tools.is_empty());
        }

        #[test]
        fn test_context_requires_known_embedding_provider() {
            let dir = tempfile::tempdir().unwrap();
            let mut config = PerceptoConfig::default();
            config.services.openai_api_key = Some("sk-test".into());
            config.embedding.provider = "word2vec".into();
            config.memory.db_path = dir.path().join("memory.db");
            assert!(matches!(
                AssistantContext::from_config(config),
                Err(PerceptoError::Config(_))
            ));
        }
    }

    // ── Fact seeding ───────────────────────────────────────────

    mod seed {
        use super::*;

        #[tokio::test]
        async fn test_seeding_skips_known_and_blank_facts() {
            let llm = Arc::new(MockProvider::new("mock"));
            let embedder = embedder();
            let ctx = setup(&llm, &embedder);
            let facts = vec![
                "Ahmed's sister is Mona".to_string(),
                "Ahmed works as an engineer".to_string(),
                "  ".to_string(),
            ];

            let first = seed_facts(&ctx, &facts).await.unwrap();
            assert_eq!(first, SeedReport { inserted: 2, skipped: 1 });
            let again = seed_facts(&ctx, &facts).await.unwrap();
            assert_eq!(again, SeedReport { inserted: 0, skipped: 3 });
            assert_eq!(ctx.memory.count(RecordFilter::Only(MemoryKind::Fact)).unwrap(), 2);
        }
    }
}
