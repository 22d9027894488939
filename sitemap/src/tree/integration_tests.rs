//! End-to-end tests of compiled sitemap trees.

use crate::components::{ActionComponent, ComponentKey, Role};
use crate::config::{Configuration, InMemoryConfigurationLoader, ProcessorConfig};
use crate::core::ACTION_RESULTS;
use crate::environment::Environment;
use crate::errors::ErrorKind;
use crate::events::{ERROR_HANDLED, MOUNT_CREATED, MOUNT_DISPOSED, REQUEST_COMPLETED};
use crate::processor::TreeProcessor;
use crate::testing::{
    assert_body, assert_error_kind, assert_redirect, assert_status, RecordingInterpreter,
    RecordingSelector, StubAction, StubMatcher, TestSitemap,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn parameter(name: &str, value: &str) -> Configuration {
    Configuration::new("parameter")
        .with_attribute("name", name)
        .with_attribute("value", value)
}

fn matching(pattern: &str, children: impl IntoIterator<Item = Configuration>) -> Configuration {
    Configuration::new("match")
        .with_attribute("pattern", pattern)
        .with_children(children)
}

#[tokio::test]
async fn test_first_pipeline_that_handles_the_request_wins() {
    let (processor, _) = TestSitemap::new()
        .pipeline(TestSitemap::match_read("foo", "a.txt"))
        .pipeline(TestSitemap::match_read("*", "{1}.txt"))
        .processor();

    let env = Environment::new("/bar");
    assert!(processor.process(&env).await.unwrap());
    assert_body(&env, "bar.txt");
    assert_status(&env, 200);
}

#[tokio::test]
async fn test_unmatched_request_is_not_found() {
    let (processor, events) = TestSitemap::new()
        .pipeline(TestSitemap::match_read("foo", "a.txt"))
        .processor();

    let env = Environment::new("bar");
    assert_error_kind(&processor.process(&env).await, ErrorKind::NotFound);

    let completed = events.events_of_type(REQUEST_COMPLETED);
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].data["handled"], false);
    assert_eq!(completed[0].data["error"], "ResourceNotFound");
}

#[tokio::test]
async fn test_failed_match_invokes_no_child() {
    let never = Arc::new(StubMatcher::never());
    let child = Arc::new(StubAction::succeeding(&[("user", "ada")]));
    let registry = TestSitemap::registry();
    registry.register_matcher("never", never.clone());
    registry.register_action("audit-child", child.clone());
    let sitemap = TestSitemap::new()
        .pipeline(
            Configuration::new("match")
                .with_attribute("type", "never")
                .with_attribute("name", "route")
                .with_attribute("pattern", "{request-param:p}")
                .with_child(Configuration::new("act").with_attribute("type", "audit-child")),
        )
        .build();
    let (processor, _) = TestSitemap::processor_with(sitemap, registry, ProcessorConfig::default());

    let env = Environment::new("page?p=home");
    assert_error_kind(&processor.process(&env).await, ErrorKind::NotFound);
    assert_eq!(never.patterns(), vec!["home".to_string()]);
    assert_eq!(child.call_count(), 0);
    assert!(env.object_model().is_empty());
}

#[tokio::test]
async fn test_select_stops_at_first_true_test() {
    let selector = Arc::new(RecordingSelector::new(&["b", "c"]));
    let registry = TestSitemap::registry();
    registry.register_selector("recording", selector.clone());
    let when = |test: &str| {
        Configuration::new("when")
            .with_attribute("test", test)
            .with_child(TestSitemap::read(test))
    };
    let sitemap = TestSitemap::new()
        .pipeline(
            Configuration::new("select")
                .with_attribute("type", "recording")
                .with_child(when("a"))
                .with_child(when("b"))
                .with_child(when("c")),
        )
        .build();
    let (processor, _) = TestSitemap::processor_with(sitemap, registry, ProcessorConfig::default());

    let env = Environment::new("anything");
    assert!(processor.process(&env).await.unwrap());
    assert_body(&env, "b");
    assert_eq!(selector.tests(), vec!["a".to_string(), "b".to_string()]);
}

#[tokio::test]
async fn test_request_parameter_switch_with_otherwise() {
    let select = Configuration::new("select")
        .with_child(parameter("parameter-name", "lang"))
        .with_child(
            Configuration::new("when")
                .with_attribute("test", "de")
                .with_child(TestSitemap::read("hallo")),
        )
        .with_child(Configuration::new("otherwise").with_child(TestSitemap::read("hello")));
    let (processor, _) = TestSitemap::new().pipeline(select).processor();

    let german = Environment::new("greet?lang=de");
    processor.process(&german).await.unwrap();
    assert_body(&german, "hallo");

    let fallback = Environment::new("greet?lang=fr");
    processor.process(&fallback).await.unwrap();
    assert_body(&fallback, "hello");
}

#[tokio::test]
async fn test_failing_action_skips_children_and_leaves_model_untouched() {
    let child = Arc::new(StubAction::succeeding(&[("role", "admin")]));
    let registry = TestSitemap::registry();
    registry.register_action("audit-child", child.clone());
    let sitemap = TestSitemap::new()
        .pipeline(matching(
            "login",
            [
                Configuration::new("act")
                    .with_attribute("type", "deny")
                    .with_attribute("name", "auth")
                    .with_child(Configuration::new("act").with_attribute("type", "audit-child")),
                TestSitemap::read("denied"),
            ],
        ))
        .build();
    let (processor, _) = TestSitemap::processor_with(sitemap, registry, ProcessorConfig::default());

    let env = Environment::new("login");
    assert!(processor.process(&env).await.unwrap());
    assert_body(&env, "denied");
    assert_eq!(child.call_count(), 0);
    assert!(!env.object_model().contains_key("auth"));
}

#[tokio::test]
async fn test_action_result_is_visible_to_children() {
    let (processor, _) = TestSitemap::new()
        .pipeline(matching(
            "profile/*",
            [Configuration::new("act")
                .with_attribute("type", "stub")
                .with_attribute("name", "auth")
                .with_attribute("src", "{1}")
                .with_child(TestSitemap::read("{user}-{#auth:user}-{../1}"))],
        ))
        .processor();

    let env = Environment::new("profile/settings");
    processor.process(&env).await.unwrap();
    assert_body(&env, "ada-ada-settings");
    assert!(env.object_model().contains_key("auth"));
}

#[tokio::test]
async fn test_action_set_runs_selected_actions() {
    let audit = Arc::new(StubAction::succeeding(&[("audited", "yes")]));
    let registry = TestSitemap::registry();
    registry.register_action("audit", audit.clone());
    let set = Configuration::new("action-set")
        .with_attribute("name", "account")
        .with_child(Configuration::new("act").with_attribute("type", "stub"))
        .with_child(
            Configuration::new("act")
                .with_attribute("type", "audit")
                .with_attribute("action", "save"),
        );
    let sitemap = TestSitemap::new()
        .raw_action_set(set)
        .pipeline(matching(
            "account",
            [Configuration::new("act")
                .with_attribute("set", "account")
                .with_child(TestSitemap::read("{user}:{audited}"))],
        ))
        .build();
    let (processor, _) = TestSitemap::processor_with(sitemap, registry, ProcessorConfig::default());

    let view = Environment::new("account");
    processor.process(&view).await.unwrap();
    assert_body(&view, "ada:");
    assert_eq!(audit.call_count(), 0);

    let save = Environment::new("account?cocoon-action=save");
    processor.process(&save).await.unwrap();
    assert_body(&save, "ada:yes");
    assert_eq!(audit.call_count(), 1);
    assert_eq!(
        save.object_model().get(ACTION_RESULTS),
        Some(serde_json::json!({ "user": "ada", "audited": "yes" }))
    );
}

#[tokio::test]
async fn test_pooled_action_is_released_after_each_call() {
    let registry = TestSitemap::registry();
    registry.register_pooled_action("session", StubAction::factory(&[("user", "grace")]));
    let ActionComponent::Pooled(pool) = registry
        .action(&ComponentKey::new(Role::Action, Some("session")))
        .unwrap()
        .1
    else {
        panic!("session action should be pooled");
    };
    let sitemap = TestSitemap::new()
        .pipeline(matching(
            "broken",
            [Configuration::new("act")
                .with_attribute("type", "session")
                .with_child(Configuration::new("generate").with_attribute("type", "failing"))
                .with_child(TestSitemap::serialize())],
        ))
        .pipeline(matching(
            "*",
            [Configuration::new("act")
                .with_attribute("type", "session")
                .with_child(TestSitemap::read("{user}"))],
        ))
        .build();
    let (processor, _) = TestSitemap::processor_with(sitemap, registry, ProcessorConfig::default());

    for _ in 0..2 {
        let env = Environment::new("home");
        assert!(processor.process(&env).await.unwrap());
        assert_body(&env, "grace");
        assert_eq!(pool.checked_out(), 0);
    }
    assert_eq!(pool.created(), 1);

    let env = Environment::new("broken");
    assert_error_kind(&processor.process(&env).await, ErrorKind::Processing);
    assert_eq!(pool.checked_out(), 0);
}

#[tokio::test]
async fn test_redirecting_action_ends_the_request() {
    let registry = TestSitemap::registry();
    registry.register_action("bounce", Arc::new(StubAction::redirecting("https://example.org/login")));
    let sitemap = TestSitemap::new()
        .pipeline(matching(
            "secure",
            [
                Configuration::new("act")
                    .with_attribute("type", "bounce")
                    .with_child(TestSitemap::read("inside")),
                TestSitemap::read("outside"),
            ],
        ))
        .build();
    let (processor, _) = TestSitemap::processor_with(sitemap, registry, ProcessorConfig::default());

    let env = Environment::new("secure");
    assert!(processor.process(&env).await.unwrap());
    assert_redirect(&env, "https://example.org/login");
    assert_body(&env, "");
}

#[tokio::test]
async fn test_generate_transform_serialize() {
    let (processor, _) = TestSitemap::new()
        .pipeline(matching(
            "page/*",
            [
                TestSitemap::generate("{1}"),
                Configuration::new("transform").with_attribute("type", "upper"),
                TestSitemap::serialize().with_attribute("status-code", "201"),
            ],
        ))
        .processor();

    let env = Environment::new("page/news");
    processor.process(&env).await.unwrap();
    assert_body(&env, "<source>NEWS</source>");
    assert_status(&env, 201);
    assert_eq!(env.response_snapshot().content_type.as_deref(), Some("text/xml"));
}

#[tokio::test]
async fn test_labelled_view_replaces_the_rest_of_the_pipeline() {
    let (processor, _) = TestSitemap::new()
        .view("content", "content", TestSitemap::serialize())
        .view_at("raw", "first", TestSitemap::serialize().with_attribute("mime-type", "text/plain"))
        .pipeline(matching(
            "page",
            [
                TestSitemap::generate("hello"),
                Configuration::new("transform")
                    .with_attribute("type", "upper")
                    .with_attribute("label", "content"),
                TestSitemap::serialize().with_attribute("mime-type", "text/html"),
            ],
        ))
        .processor();

    let normal = Environment::new("page");
    processor.process(&normal).await.unwrap();
    assert_body(&normal, "<source>HELLO</source>");

    let content = Environment::new("page?cocoon-view=content");
    processor.process(&content).await.unwrap();
    assert_body(&content, "<source>HELLO</source>");
    assert_eq!(content.response_snapshot().content_type.as_deref(), Some("text/xml"));

    let raw = Environment::new("page?cocoon-view=raw");
    processor.process(&raw).await.unwrap();
    assert_body(&raw, "<source>hello</source>");
    assert_eq!(raw.response_snapshot().content_type.as_deref(), Some("text/plain"));
}

#[tokio::test]
async fn test_aggregate_of_internal_pipelines() {
    let aggregate = Configuration::new("aggregate")
        .with_attribute("element", "page")
        .with_child(Configuration::new("part").with_attribute("src", "cocoon:/header"))
        .with_child(
            Configuration::new("part")
                .with_attribute("src", "cocoon:/body/{1}")
                .with_attribute("element", "main")
                .with_attribute("strip-root", "true"),
        );
    let internal = Configuration::new("pipeline")
        .with_attribute("internal-only", "true")
        .with_child(TestSitemap::match_generate("header", "Title"))
        .with_child(TestSitemap::match_generate("body/*", "{1}"));
    let (processor, _) = TestSitemap::new()
        .raw_pipeline(internal)
        .pipeline(matching("*", [aggregate, TestSitemap::serialize()]))
        .processor();

    let env = Environment::new("intro");
    assert!(processor.process(&env).await.unwrap());
    assert_body(&env, "<page><source>Title</source><main>intro</main></page>");
}

#[tokio::test]
async fn test_nested_aggregate_resolves_its_own_internal_parts() {
    let middle = Configuration::new("aggregate")
        .with_attribute("element", "middle")
        .with_child(Configuration::new("part").with_attribute("src", "cocoon:/leaf"));
    let internal = Configuration::new("pipeline")
        .with_attribute("internal-only", "true")
        .with_child(matching("middle", [middle, TestSitemap::serialize()]))
        .with_child(TestSitemap::match_generate("leaf", "Leaf"));
    let outer = Configuration::new("aggregate")
        .with_attribute("element", "page")
        .with_child(Configuration::new("part").with_attribute("src", "cocoon:/middle"));
    let (processor, _) = TestSitemap::new()
        .raw_pipeline(internal)
        .pipeline(matching("page", [outer, TestSitemap::serialize()]))
        .processor();

    let env = Environment::new("page");
    assert!(processor.process(&env).await.unwrap());
    assert_body(&env, "<page><middle><source>Leaf</source></middle></page>");
    assert!(env.current_processor().is_none());
}

#[tokio::test]
async fn test_aggregate_jumps_to_the_requested_view() {
    let aggregate = Configuration::new("aggregate")
        .with_attribute("element", "page")
        .with_attribute("label", "summary")
        .with_child(
            Configuration::new("part")
                .with_attribute("src", "cocoon:/menu")
                .with_attribute("label", "nav"),
        )
        .with_child(Configuration::new("part").with_attribute("src", "cocoon:/body"));
    let internal = Configuration::new("pipeline")
        .with_attribute("internal-only", "true")
        .with_child(TestSitemap::match_generate("menu", "Menu"))
        .with_child(TestSitemap::match_generate("body", "Body"));
    let (processor, _) = TestSitemap::new()
        .view("nav", "nav", TestSitemap::serialize())
        .view(
            "summary",
            "summary",
            TestSitemap::serialize().with_attribute("mime-type", "text/plain"),
        )
        .raw_pipeline(internal)
        .pipeline(matching(
            "page",
            [
                aggregate,
                Configuration::new("transform").with_attribute("type", "upper"),
                TestSitemap::serialize().with_attribute("mime-type", "text/html"),
            ],
        ))
        .processor();

    let normal = Environment::new("page");
    processor.process(&normal).await.unwrap();
    assert_body(&normal, "<page><source>MENU</source><source>BODY</source></page>");
    assert_eq!(normal.response_snapshot().content_type.as_deref(), Some("text/html"));

    let nav = Environment::new("page?cocoon-view=nav");
    assert!(processor.process(&nav).await.unwrap());
    assert_body(&nav, "<page><source>Menu</source></page>");
    assert_eq!(nav.response_snapshot().content_type.as_deref(), Some("text/xml"));

    let summary = Environment::new("page?cocoon-view=summary");
    assert!(processor.process(&summary).await.unwrap());
    assert_body(&summary, "<page><source>Menu</source><source>Body</source></page>");
    assert_eq!(summary.response_snapshot().content_type.as_deref(), Some("text/plain"));
}

#[tokio::test]
async fn test_internal_only_pipeline_refuses_external_requests() {
    let internal = Configuration::new("pipeline")
        .with_attribute("internal-only", "true")
        .with_child(TestSitemap::match_read("secret", "classified"));
    let (processor, _) = TestSitemap::new().raw_pipeline(internal).processor();

    let env = Environment::new("secret");
    assert_error_kind(&processor.process(&env).await, ErrorKind::NotFound);

    let internal_env = Environment::new("secret").internal();
    assert!(processor.process(&internal_env).await.unwrap());
    assert_body(&internal_env, "classified");
}

#[tokio::test]
async fn test_error_handler_renders_notification() {
    let pipeline = Configuration::new("pipeline")
        .with_child(matching(
            "broken",
            [
                Configuration::new("generate").with_attribute("type", "failing"),
                TestSitemap::serialize(),
            ],
        ))
        .with_child(
            Configuration::new("handle-errors")
                .with_attribute("type", "500")
                .with_child(TestSitemap::serialize()),
        );
    let (processor, events) = TestSitemap::new().raw_pipeline(pipeline).processor();

    let env = Environment::new("broken");
    assert!(processor.process(&env).await.unwrap());
    assert_status(&env, 500);
    let body = env.response_snapshot().body_text();
    assert!(body.contains("generator failed"), "unexpected body: {body}");
    assert!(body.contains("An Error Occurred"));
    assert!(env.object_model().contains_key("throwable"));

    let handled = events.events_of_type(ERROR_HANDLED);
    assert_eq!(handled.len(), 1);
    assert_eq!(handled[0].data["status"], 500);
}

#[tokio::test]
async fn test_not_found_goes_to_the_root_404_handler() {
    let handler = Configuration::new("handle-errors")
        .with_attribute("type", "404")
        .with_child(TestSitemap::generate("missing page"))
        .with_child(TestSitemap::serialize());
    let (processor, _) = TestSitemap::new()
        .pipeline(TestSitemap::match_read("home", "welcome"))
        .handle_errors(handler)
        .processor();

    let env = Environment::new("nowhere");
    assert!(processor.process(&env).await.unwrap());
    assert_status(&env, 404);
    assert_body(&env, "<source>missing page</source>");
}

#[tokio::test]
async fn test_pipeline_prefers_its_404_handler_for_missing_resources() {
    let pipeline = Configuration::new("pipeline")
        .with_child(matching(
            "gone",
            [
                Configuration::new("generate").with_attribute("type", "missing"),
                TestSitemap::serialize(),
            ],
        ))
        .with_child(
            Configuration::new("handle-errors")
                .with_attribute("type", "404")
                .with_child(TestSitemap::generate("not here"))
                .with_child(TestSitemap::serialize()),
        )
        .with_child(
            Configuration::new("handle-errors")
                .with_attribute("type", "500")
                .with_child(TestSitemap::generate("server trouble"))
                .with_child(TestSitemap::serialize()),
        );
    let (processor, events) = TestSitemap::new().raw_pipeline(pipeline).processor();

    let env = Environment::new("gone");
    assert!(processor.process(&env).await.unwrap());
    assert_status(&env, 404);
    assert_body(&env, "<source>not here</source>");

    let handled = events.events_of_type(ERROR_HANDLED);
    assert_eq!(handled.len(), 1);
    assert_eq!(handled[0].data["status"], 404);
}

#[tokio::test]
async fn test_missing_resource_falls_back_to_the_main_handler() {
    let pipeline = Configuration::new("pipeline")
        .with_child(matching(
            "gone",
            [
                Configuration::new("generate").with_attribute("type", "missing"),
                TestSitemap::serialize(),
            ],
        ))
        .with_child(
            Configuration::new("handle-errors")
                .with_child(TestSitemap::generate("fallback"))
                .with_child(TestSitemap::serialize()),
        );
    let (processor, _) = TestSitemap::new().raw_pipeline(pipeline).processor();

    let env = Environment::new("gone");
    assert!(processor.process(&env).await.unwrap());
    assert_status(&env, 500);
    assert_body(&env, "<source>fallback</source>");
}

#[tokio::test]
async fn test_declining_handler_returns_the_original_error() {
    let pipeline = Configuration::new("pipeline")
        .with_child(matching(
            "broken",
            [
                Configuration::new("generate").with_attribute("type", "failing"),
                TestSitemap::serialize(),
            ],
        ))
        .with_child(
            Configuration::new("handle-errors")
                .with_attribute("type", "500")
                .with_child(matching("elsewhere", [TestSitemap::serialize()])),
        );
    let (processor, events) = TestSitemap::new().raw_pipeline(pipeline).processor();

    let env = Environment::new("broken");
    let result = processor.process(&env).await;

    assert_error_kind(&result, ErrorKind::Processing);
    let message = result.unwrap_err().to_string();
    assert!(message.contains("generator failed"), "unexpected error: {message}");
    assert!(!env.handler_failed());
    assert!(events.events_of_type(ERROR_HANDLED).is_empty());
}

#[tokio::test]
async fn test_failing_handler_error_reaches_the_caller_once() {
    let failing_handler = Configuration::new("handle-errors")
        .with_attribute("type", "500")
        .with_child(Configuration::new("generate").with_attribute("type", "missing"))
        .with_child(TestSitemap::serialize());
    let pipeline = Configuration::new("pipeline")
        .with_child(matching(
            "broken",
            [
                Configuration::new("generate").with_attribute("type", "failing"),
                TestSitemap::serialize(),
            ],
        ))
        .with_child(failing_handler);
    let root_handler = Configuration::new("handle-errors")
        .with_child(TestSitemap::generate("root handler"))
        .with_child(TestSitemap::serialize());
    let (processor, events) = TestSitemap::new()
        .raw_pipeline(pipeline)
        .handle_errors(root_handler)
        .processor();

    let env = Environment::new("broken");
    let result = processor.process(&env).await;

    assert_error_kind(&result, ErrorKind::NotFound);
    assert!(env.handler_failed());
    assert!(events.events_of_type(ERROR_HANDLED).is_empty());
    assert_eq!(events.events_of_type(REQUEST_COMPLETED).len(), 1);
    assert!(!env.response_snapshot().body_text().contains("root handler"));
}

#[tokio::test]
async fn test_internal_requests_bypass_error_handlers() {
    let pipeline = Configuration::new("pipeline")
        .with_child(matching(
            "broken",
            [
                Configuration::new("generate").with_attribute("type", "failing"),
                TestSitemap::serialize(),
            ],
        ))
        .with_child(
            Configuration::new("handle-errors")
                .with_attribute("type", "500")
                .with_child(TestSitemap::serialize()),
        );
    let (processor, events) = TestSitemap::new().raw_pipeline(pipeline).processor();

    let env = Environment::new("broken").internal();
    assert_error_kind(&processor.process(&env).await, ErrorKind::Processing);
    assert!(events.events_of_type(ERROR_HANDLED).is_empty());
}

#[tokio::test]
async fn test_cocoon_redirect_is_forwarded_internally() {
    let (processor, _) = TestSitemap::new()
        .pipeline(matching(
            "old/*",
            [Configuration::new("redirect-to").with_attribute("uri", "cocoon:/new/{1}")],
        ))
        .pipeline(TestSitemap::match_read("new/*", "moved-{1}"))
        .processor();

    let env = Environment::new("old/report");
    assert!(processor.process(&env).await.unwrap());
    assert_body(&env, "moved-report");
    assert!(!env.response_snapshot().is_redirect());
}

#[tokio::test]
async fn test_external_redirects() {
    let (processor, _) = TestSitemap::new()
        .pipeline(matching(
            "temporary",
            [Configuration::new("redirect-to").with_attribute("uri", "https://example.org/t")],
        ))
        .pipeline(matching(
            "permanent",
            [Configuration::new("redirect-to")
                .with_attribute("uri", "https://example.org/p")
                .with_attribute("permanent", "true")],
        ))
        .processor();

    let temporary = Environment::new("temporary");
    processor.process(&temporary).await.unwrap();
    assert_redirect(&temporary, "https://example.org/t");
    assert_status(&temporary, 302);

    let permanent = Environment::new("permanent");
    processor.process(&permanent).await.unwrap();
    assert_redirect(&permanent, "https://example.org/p");
    assert_status(&permanent, 301);
}

#[tokio::test]
async fn test_build_pipeline_does_not_execute() {
    let (processor, _) = TestSitemap::new()
        .pipeline(matching(
            "alias",
            [Configuration::new("redirect-to").with_attribute("uri", "cocoon:/page")],
        ))
        .pipeline(TestSitemap::match_generate("page", "content"))
        .processor();

    for uri in ["page", "alias"] {
        let env = Environment::new(uri);
        let pipeline = processor.build_pipeline(&env).await.unwrap().unwrap();
        let generator = pipeline.generator().unwrap();
        assert_eq!(generator.type_name, "echo");
        assert_eq!(generator.source.as_deref(), Some("content"));
        assert_eq!(pipeline.serializer().unwrap().type_name, "xml");
        assert!(env.response_snapshot().body.is_empty());
    }
}

#[tokio::test]
async fn test_flow_function_and_continuation() {
    let interpreter = Arc::new(RecordingInterpreter::new());
    let registry = TestSitemap::registry();
    registry.register_interpreter("test", interpreter.clone());
    let sitemap = TestSitemap::new()
        .flow(&["flow/shop.js"])
        .pipeline(matching(
            "shop/*",
            [Configuration::new("call")
                .with_attribute("function", "{1}")
                .with_attribute("continuation", "{request-param:kont}")
                .with_child(parameter("item", "{request-param:item}"))],
        ))
        .build();
    let (processor, _) = TestSitemap::processor_with(sitemap, registry, ProcessorConfig::default());

    let start = Environment::new("shop/checkout?item=book");
    assert!(processor.process(&start).await.unwrap());
    assert_status(&start, 200);

    let resume = Environment::new("shop/checkout?kont=k42");
    assert!(processor.process(&resume).await.unwrap());

    assert_eq!(interpreter.scripts(), vec!["flow/shop.js".to_string()]);
    assert_eq!(
        interpreter.calls(),
        vec![
            (
                "function:checkout".to_string(),
                vec![("item".to_string(), "book".to_string())]
            ),
            ("continuation:k42".to_string(), vec![("item".to_string(), String::new())]),
        ]
    );
}

#[tokio::test]
async fn test_flow_without_response_is_an_error() {
    let registry = TestSitemap::registry();
    registry.register_interpreter("test", Arc::new(RecordingInterpreter::silent()));
    let sitemap = TestSitemap::new()
        .flow(&[])
        .pipeline(matching(
            "quiet",
            [Configuration::new("call").with_attribute("function", "noop")],
        ))
        .build();
    let (processor, _) = TestSitemap::processor_with(sitemap, registry, ProcessorConfig::default());

    let env = Environment::new("quiet");
    let result = processor.process(&env).await;
    assert_error_kind(&result, ErrorKind::Processing);
    assert!(result.unwrap_err().to_string().contains("did not send a response"));
}

fn child_sitemap(body: &str) -> Configuration {
    TestSitemap::new()
        .pipeline(TestSitemap::match_read("*", &format!("{body}-{{1}}")))
        .build()
}

fn mounting(sitemap: Configuration, loader: InMemoryConfigurationLoader) -> (Arc<TreeProcessor>, Arc<crate::events::CollectingEventSink>) {
    let (services, events) = TestSitemap::services(TestSitemap::registry(), loader);
    (TreeProcessor::from_configuration("sitemap.xmap", sitemap, services), events)
}

#[tokio::test]
async fn test_mount_caches_child_processor_by_source() {
    let loader = InMemoryConfigurationLoader::new()
        .with_document("a/sitemap.xmap", child_sitemap("a"))
        .with_document("b/sitemap.xmap", child_sitemap("b"));
    let sitemap = TestSitemap::new()
        .pipeline(matching(
            "*/**",
            [Configuration::new("mount")
                .with_attribute("src", "{1}/")
                .with_attribute("uri-prefix", "{1}")],
        ))
        .build();
    let (processor, events) = mounting(sitemap, loader);

    for (uri, body) in [("a/x", "a-x"), ("a/y", "a-y"), ("b/x", "b-x")] {
        let env = Environment::new(uri);
        assert!(processor.process(&env).await.unwrap());
        assert_body(&env, body);
        assert_eq!(env.uri(), uri);
    }

    let created: Vec<String> = events
        .events_of_type(MOUNT_CREATED)
        .iter()
        .map(|event| event.data["sitemap"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(created, vec!["a/sitemap.xmap".to_string(), "b/sitemap.xmap".to_string()]);

    processor.dispose();
    processor.dispose();
    assert_eq!(events.events_of_type(MOUNT_DISPOSED).len(), 2);
    assert!(processor.process(&Environment::new("a/x")).await.is_err());
}

#[tokio::test]
async fn test_pass_through_mount_falls_back_to_next_pipeline() {
    let loader = InMemoryConfigurationLoader::new().with_document(
        "docs/sitemap.xmap",
        TestSitemap::new()
            .pipeline(TestSitemap::match_read("guide", "docs-guide"))
            .build(),
    );
    let mount = |pass_through: &str| {
        Configuration::new("mount")
            .with_attribute("src", "docs/")
            .with_attribute("uri-prefix", "docs")
            .with_attribute("pass-through", pass_through)
    };
    let sitemap = |pass_through: &str| {
        TestSitemap::new()
            .pipeline(matching("docs/**", [mount(pass_through)]))
            .pipeline(TestSitemap::match_read("docs/*", "fallback-{1}"))
            .build()
    };

    let (processor, _) = mounting(sitemap("true"), loader);
    let known = Environment::new("docs/guide");
    processor.process(&known).await.unwrap();
    assert_body(&known, "docs-guide");

    let unknown = Environment::new("docs/faq");
    assert!(processor.process(&unknown).await.unwrap());
    assert_body(&unknown, "fallback-faq");
    assert!(!unknown.is_pass_through());

    let loader = InMemoryConfigurationLoader::new().with_document(
        "docs/sitemap.xmap",
        TestSitemap::new()
            .pipeline(TestSitemap::match_read("guide", "docs-guide"))
            .build(),
    );
    let (strict, _) = mounting(sitemap("false"), loader);
    assert_error_kind(&strict.process(&Environment::new("docs/faq")).await, ErrorKind::NotFound);
}

#[tokio::test]
async fn test_mount_build_only_returns_child_pipeline() {
    let loader = InMemoryConfigurationLoader::new().with_document(
        "parts/sitemap.xmap",
        TestSitemap::new()
            .pipeline(TestSitemap::match_generate("*", "part-{1}"))
            .build(),
    );
    let sitemap = TestSitemap::new()
        .pipeline(matching(
            "parts/**",
            [Configuration::new("mount")
                .with_attribute("src", "parts/")
                .with_attribute("uri-prefix", "parts")],
        ))
        .pipeline(matching(
            "page",
            [
                Configuration::new("aggregate")
                    .with_attribute("element", "page")
                    .with_child(Configuration::new("part").with_attribute("src", "cocoon:/parts/one")),
                TestSitemap::serialize(),
            ],
        ))
        .build();
    let (processor, _) = mounting(sitemap, loader);

    let env = Environment::new("page");
    processor.process(&env).await.unwrap();
    assert_body(&env, "<page><source>part-one</source></page>");
}

#[tokio::test]
async fn test_concurrent_requests_share_one_tree() {
    let (processor, _) = TestSitemap::new()
        .pipeline(TestSitemap::match_read("item/*", "item-{1}"))
        .processor();

    let requests = (0..16).map(|i| {
        let processor = processor.clone();
        async move {
            let env = Environment::new(&format!("item/{i}"));
            let outcome = processor.process(&env).await;
            outcome.map(|_| env.response_snapshot().body_text())
        }
    });
    let bodies = futures::future::join_all(requests).await;

    for (i, body) in bodies.into_iter().enumerate() {
        assert_eq!(body.unwrap(), format!("item-{i}"));
    }
}

#[tokio::test]
async fn test_registry_default_generator() {
    let registry = TestSitemap::registry();
    registry.set_default(Role::Generator, "notifying");
    let sitemap = TestSitemap::new()
        .pipeline(TestSitemap::match_generate("page", "x"))
        .build();
    let (processor, _) = TestSitemap::processor_with(sitemap, registry, ProcessorConfig::default());

    let pipeline = processor
        .build_pipeline(&Environment::new("page"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pipeline.generator().unwrap().type_name, "notifying");
}
