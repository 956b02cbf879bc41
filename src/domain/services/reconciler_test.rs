use super::failure_notice;
use super::Reconciler;
use super::STOPPED_NOTICE;
use crate::domain::models::Event;
use crate::domain::models::Message;
use crate::domain::models::Phase;
use crate::domain::models::ProviderError;
use crate::domain::models::Role;
use crate::domain::services::MessageStore;

fn target_content(store: &MessageStore) -> String {
    return store.messages().last().unwrap().content.to_string();
}

fn begin_streaming(reconciler: &mut Reconciler, store: &mut MessageStore) -> String {
    let begin = reconciler.begin_send(store, "hi").unwrap();
    assert!(reconciler.resolve_stream());
    assert_eq!(reconciler.phase(), Phase::Streaming);
    assert!(!begin.cancel.is_cancelled());

    return reconciler.session().unwrap().message_id.to_string();
}

mod begin {
    use super::*;

    #[test]
    fn it_appends_one_empty_assistant_message_before_io() {
        let mut store = MessageStore::seeded();
        let mut reconciler = Reconciler::default();

        let begin = reconciler.begin_send(&mut store, "  hello  ").unwrap();

        let messages = store.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].content, "hello");
        assert_eq!(messages[2].role, Role::Assistant);
        assert_eq!(messages[2].content, "");
        assert_eq!(reconciler.phase(), Phase::Pending);
        assert_eq!(reconciler.session().unwrap().message_id, messages[2].id);

        // The provider is asked about the conversation up to the new user turn.
        assert_eq!(begin.history.len(), 2);
        assert_eq!(begin.history.last().unwrap().content, "hello");

        assert_eq!(
            begin.events,
            vec![
                Event::MessageAppended(messages[1].clone()),
                Event::MessageAppended(messages[2].clone()),
                Event::SessionStarted(messages[2].id.to_string()),
            ]
        );
    }

    #[test]
    fn it_includes_the_system_prompt_in_history() {
        let mut store = MessageStore::seeded();
        store.set_system_prompt("Be brief.");
        let mut reconciler = Reconciler::default();

        let begin = reconciler.begin_send(&mut store, "hello").unwrap();
        assert_eq!(begin.history[0].role, Role::System);
        assert_eq!(begin.history[0].content, "Be brief.");
        assert_eq!(store.messages().len(), 3);
    }

    #[test]
    fn it_ignores_blank_input() {
        let mut store = MessageStore::seeded();
        let mut reconciler = Reconciler::default();

        assert!(reconciler.begin_send(&mut store, " \n ").is_none());
        assert_eq!(store.messages().len(), 1);
        assert_eq!(reconciler.phase(), Phase::Idle);
    }

    #[test]
    fn it_rejects_send_while_streaming() {
        let mut store = MessageStore::seeded();
        let mut reconciler = Reconciler::default();
        let message_id = begin_streaming(&mut reconciler, &mut store);
        let count = store.messages().len();

        assert!(reconciler.begin_send(&mut store, "again").is_none());
        assert!(reconciler.begin_regenerate(&mut store).is_none());

        assert_eq!(store.messages().len(), count);
        assert_eq!(reconciler.session().unwrap().message_id, message_id);
    }

    #[test]
    fn it_rejects_send_while_pending() {
        let mut store = MessageStore::seeded();
        let mut reconciler = Reconciler::default();
        reconciler.begin_send(&mut store, "first").unwrap();

        assert!(reconciler.begin_send(&mut store, "second").is_none());
        assert_eq!(store.messages().len(), 3);
    }
}

mod regenerate {
    use super::*;

    #[test]
    fn it_truncates_to_last_user_message() {
        let old = Message::new(Role::Assistant, "old");
        let mut store = MessageStore::new(vec![Message::new(Role::User, "hi"), old.clone()]);
        let mut reconciler = Reconciler::default();

        let begin = reconciler.begin_regenerate(&mut store).unwrap();

        assert_eq!(begin.history.len(), 1);
        assert_eq!(begin.history[0].content, "hi");

        let messages = store.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "hi");
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].content, "");
        assert_ne!(messages[1].id, old.id);
        assert!(store.get(&old.id).is_none());

        assert_eq!(
            begin.events[0],
            Event::ConversationReset(vec![messages[0].clone()])
        );
    }

    #[test]
    fn it_is_a_noop_without_user_messages() {
        let mut store = MessageStore::seeded();
        let mut reconciler = Reconciler::default();

        assert!(reconciler.begin_regenerate(&mut store).is_none());
        assert_eq!(store.messages().len(), 1);
        assert_eq!(reconciler.phase(), Phase::Idle);
    }
}

mod immediate {
    use super::*;

    #[test]
    fn it_sets_content_in_one_update() {
        let mut store = MessageStore::seeded();
        let mut reconciler = Reconciler::default();
        reconciler.begin_send(&mut store, "hi").unwrap();
        let message_id = reconciler.session().unwrap().message_id.to_string();

        let events = reconciler.resolve_immediate(&mut store, "hello");

        assert_eq!(
            events,
            vec![
                Event::ContentReplaced(message_id.to_string(), "hello".to_string()),
                Event::SessionFinished(message_id, Phase::Completed),
            ]
        );
        assert_eq!(target_content(&store), "hello");
        assert_eq!(reconciler.phase(), Phase::Idle);
    }

    #[test]
    fn it_ignores_immediate_replies_without_a_pending_session() {
        let mut store = MessageStore::seeded();
        let mut reconciler = Reconciler::default();

        assert!(reconciler.resolve_immediate(&mut store, "hello").is_empty());
        assert_eq!(store.messages().len(), 1);
    }
}

mod streaming {
    use super::*;

    #[test]
    fn it_appends_fragments_in_order() {
        let mut store = MessageStore::seeded();
        let mut reconciler = Reconciler::default();
        let message_id = begin_streaming(&mut reconciler, &mut store);

        for fragment in ["A", "B", "C"] {
            let events = reconciler.apply_fragment(&mut store, fragment);
            assert_eq!(
                events,
                vec![Event::ContentAppended(
                    message_id.to_string(),
                    fragment.to_string()
                )]
            );
        }
        let events = reconciler.complete();

        assert_eq!(target_content(&store), "ABC");
        assert_eq!(
            events,
            vec![Event::SessionFinished(message_id, Phase::Completed)]
        );
        assert_eq!(reconciler.phase(), Phase::Idle);
    }

    #[test]
    fn it_stops_applying_fragments_after_cancel() {
        let mut store = MessageStore::seeded();
        let mut reconciler = Reconciler::default();
        let message_id = begin_streaming(&mut reconciler, &mut store);

        reconciler.apply_fragment(&mut store, "A");
        assert!(reconciler.cancel());
        let events = reconciler.apply_fragment(&mut store, "B");
        let trailing = reconciler.apply_fragment(&mut store, "C");

        assert_eq!(target_content(&store), "A");
        assert_eq!(
            events,
            vec![Event::SessionFinished(message_id, Phase::Completed)]
        );
        assert!(trailing.is_empty());
        assert_eq!(reconciler.phase(), Phase::Idle);
        assert!(!reconciler.cancel());
    }

    #[test]
    fn it_keeps_partial_content_when_the_stream_reports_the_abort() {
        let mut store = MessageStore::seeded();
        let mut reconciler = Reconciler::default();
        let message_id = begin_streaming(&mut reconciler, &mut store);

        reconciler.apply_fragment(&mut store, "A");
        reconciler.cancel();
        let events = reconciler.fail(&mut store, &ProviderError::Aborted);

        assert_eq!(target_content(&store), "A");
        assert_eq!(
            events,
            vec![Event::SessionFinished(message_id, Phase::Completed)]
        );
    }

    #[test]
    fn it_ignores_fragments_while_pending() {
        let mut store = MessageStore::seeded();
        let mut reconciler = Reconciler::default();
        reconciler.begin_send(&mut store, "hi").unwrap();

        assert!(reconciler.apply_fragment(&mut store, "A").is_empty());
        assert_eq!(target_content(&store), "");
        assert_eq!(reconciler.phase(), Phase::Pending);
    }
}

mod failures {
    use super::*;

    #[test]
    fn it_writes_an_error_notice() {
        let mut store = MessageStore::seeded();
        let mut reconciler = Reconciler::default();
        reconciler.begin_send(&mut store, "hi").unwrap();
        let message_id = reconciler.session().unwrap().message_id.to_string();

        let events = reconciler.fail(
            &mut store,
            &ProviderError::Transport("network down".to_string()),
        );

        let content = target_content(&store);
        assert!(content.contains("network down"));
        insta::assert_snapshot!(content, @"An error occurred: request failed: network down");
        assert_eq!(
            events,
            vec![
                Event::ContentReplaced(message_id.to_string(), content.to_string()),
                Event::SessionFinished(message_id, Phase::Errored),
            ]
        );
        assert_eq!(reconciler.phase(), Phase::Idle);
    }

    #[test]
    fn it_overwrites_partial_content_on_mid_stream_failure() {
        let mut store = MessageStore::seeded();
        let mut reconciler = Reconciler::default();
        begin_streaming(&mut reconciler, &mut store);
        reconciler.apply_fragment(&mut store, "A");

        reconciler.fail(&mut store, &ProviderError::Malformed("bad frame".to_string()));

        assert_eq!(
            target_content(&store),
            "An error occurred: malformed response: bad frame"
        );
    }

    #[test]
    fn it_writes_the_stopped_notice_when_cancelled_while_pending() {
        let mut store = MessageStore::seeded();
        let mut reconciler = Reconciler::default();
        let begin = reconciler.begin_send(&mut store, "hi").unwrap();

        assert!(reconciler.cancel());
        assert!(begin.cancel.is_cancelled());
        let events = reconciler.fail(&mut store, &ProviderError::Aborted);

        assert_eq!(target_content(&store), STOPPED_NOTICE);
        assert!(matches!(
            events.last(),
            Some(Event::SessionFinished(_, Phase::Errored))
        ));
    }

    #[test]
    fn it_allows_a_new_session_after_a_failure() {
        let mut store = MessageStore::seeded();
        let mut reconciler = Reconciler::default();
        reconciler.begin_send(&mut store, "hi").unwrap();
        reconciler.fail(&mut store, &ProviderError::Status(500));

        assert!(reconciler.begin_send(&mut store, "again").is_some());
        assert_eq!(store.messages().len(), 5);
    }

    #[test]
    fn it_formats_failure_notices() {
        assert_eq!(failure_notice(&ProviderError::Aborted), "(stopped)");
        insta::assert_snapshot!(failure_notice(&ProviderError::Status(502)), @"An error occurred: server responded with status 502");
    }
}
