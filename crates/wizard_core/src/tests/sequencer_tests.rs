use super::*;

use std::sync::atomic::{AtomicBool, Ordering};

use shared::domain::DEFAULT_LAYOUT;

use crate::samples::SamplePrompt;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct Recorded {
    name: String,
    description: String,
    taps: Vec<CategoryId>,
    layout: Option<String>,
    resets: usize,
}

/// Records every applied interaction; honours tokens under its lock the
/// same way the real session does.
struct FakeTarget {
    state: tokio::sync::Mutex<Recorded>,
    ready: AtomicBool,
    step: Mutex<WizardStep>,
}

impl FakeTarget {
    fn new(ready: bool) -> Arc<Self> {
        Arc::new(Self {
            state: tokio::sync::Mutex::new(Recorded::default()),
            ready: AtomicBool::new(ready),
            step: Mutex::new(WizardStep::Name),
        })
    }

    async fn recorded(&self) -> Recorded {
        self.state.lock().await.clone()
    }
}

#[async_trait]
impl InteractionTarget for FakeTarget {
    async fn apply(&self, token: &CancellationToken, interaction: Interaction) -> Applied {
        let mut state = self.state.lock().await;
        if token.is_cancelled() {
            return Applied::Cancelled;
        }
        match interaction {
            Interaction::ClearText(TextField::Name) => state.name.clear(),
            Interaction::ClearText(TextField::Description) => state.description.clear(),
            Interaction::PushChar(TextField::Name, ch) => state.name.push(ch),
            Interaction::PushChar(TextField::Description, ch) => state.description.push(ch),
            Interaction::PopChar(field) => {
                let popped = match field {
                    TextField::Name => state.name.pop(),
                    TextField::Description => state.description.pop(),
                };
                if popped.is_none() {
                    return Applied::Empty;
                }
            }
            Interaction::Tap(id) => state.taps.push(id),
            Interaction::SelectLayout(name) => state.layout = Some(name),
            Interaction::ResetDraft => {
                *state = Recorded {
                    resets: state.resets + 1,
                    ..Recorded::default()
                }
            }
        }
        Applied::Done
    }

    async fn is_tree_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn current_step(&self) -> WizardStep {
        *self.step.lock()
    }
}

fn timings() -> SequencerTimings {
    SequencerTimings {
        typing_per_char_ms: 10,
        typing_lead_ms: 0,
        erase_per_char_ms: 5,
        tap_initial_ms: 20,
        tap_step_ms: 20,
        readiness_interval_ms: 10,
        readiness_attempts: 3,
        tutorial_hold_ms: 50,
        tutorial_gap_ms: 20,
        autofill_pause_ms: 30,
    }
}

fn sequencer(target: Arc<FakeTarget>) -> InteractionSequencer {
    let samples = SampleCatalogue {
        prompts: vec![
            SamplePrompt::new("Best Cheeses", "food-dairy-cheese"),
            SamplePrompt::new("Top 20 Countries", "geography-countries"),
        ],
        descriptions: vec!["Ranked by smell".into()],
    };
    InteractionSequencer::new(target, timings(), samples, Some(42))
}

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

#[tokio::test(start_paused = true)]
async fn typing_completes_with_the_full_text() {
    let target = FakeTarget::new(true);
    let sequencer = sequencer(target.clone());

    let handle = sequencer.type_text(TextField::Name, "Top 20", ms(10), ms(100));
    assert_eq!(handle.task(), SequenceTask::TypeText(TextField::Name));
    assert_eq!(handle.wait().await, SequenceOutcome::Completed);
    assert_eq!(target.recorded().await.name, "Top 20");
}

#[tokio::test(start_paused = true)]
async fn cancelled_typing_leaves_a_strict_prefix_and_stays_put() {
    let target = FakeTarget::new(true);
    let sequencer = sequencer(target.clone());
    let full = "Top 20 Countries";

    let handle = sequencer.type_text(TextField::Name, full, ms(10), Duration::ZERO);
    tokio::time::sleep(ms(35)).await;
    sequencer.cancel(Channel::Name);
    assert_eq!(handle.wait().await, SequenceOutcome::Cancelled);

    let typed = target.recorded().await.name;
    assert!(full.starts_with(&typed), "{typed:?} is not a prefix");
    assert!(typed.len() < full.len());

    tokio::time::sleep(ms(200)).await;
    assert_eq!(target.recorded().await.name, typed);
}

#[tokio::test(start_paused = true)]
async fn immediate_cancel_types_nothing() {
    let target = FakeTarget::new(true);
    let sequencer = sequencer(target.clone());

    let handle = sequencer.type_text(TextField::Name, "Top 20 Countries", ms(10), Duration::ZERO);
    handle.cancel();
    assert_eq!(handle.wait().await, SequenceOutcome::Cancelled);
    tokio::time::sleep(ms(100)).await;
    assert_eq!(target.recorded().await.name, "");
}

#[tokio::test(start_paused = true)]
async fn new_task_on_a_channel_replaces_the_old_one() {
    let target = FakeTarget::new(true);
    let sequencer = sequencer(target.clone());

    let first = sequencer.type_text(TextField::Name, "aaaaaaaaaa", ms(10), Duration::ZERO);
    tokio::time::sleep(ms(25)).await;
    let second = sequencer.type_text(TextField::Name, "bb", ms(10), Duration::ZERO);

    assert_eq!(first.wait().await, SequenceOutcome::Cancelled);
    assert_eq!(second.wait().await, SequenceOutcome::Completed);
    tokio::time::sleep(ms(200)).await;
    assert_eq!(target.recorded().await.name, "bb");
}

#[tokio::test(start_paused = true)]
async fn channels_cancel_independently() {
    let target = FakeTarget::new(true);
    let sequencer = sequencer(target.clone());

    let name = sequencer.type_text(TextField::Name, "Best Cheeses", ms(10), Duration::ZERO);
    let description =
        sequencer.type_text(TextField::Description, "Ranked by smell", ms(10), Duration::ZERO);
    tokio::time::sleep(ms(15)).await;
    sequencer.cancel(Channel::Description);

    assert_eq!(description.wait().await, SequenceOutcome::Cancelled);
    assert_eq!(name.wait().await, SequenceOutcome::Completed);
    assert_eq!(target.recorded().await.name, "Best Cheeses");
}

#[tokio::test(start_paused = true)]
async fn erase_removes_characters_until_empty() {
    let target = FakeTarget::new(true);
    target.state.lock().await.description = "abc".into();
    let sequencer = sequencer(target.clone());

    let handle = sequencer.erase_text(TextField::Description, ms(5));
    assert_eq!(handle.wait().await, SequenceOutcome::Completed);
    assert_eq!(target.recorded().await.description, "");
}

#[tokio::test(start_paused = true)]
async fn tap_sequence_walks_the_lineage_in_order() {
    let target = FakeTarget::new(true);
    let sequencer = sequencer(target.clone());

    let handle = sequencer.run_tap_sequence(CategoryId::from("food-dairy-milk"), ms(20), ms(20));
    assert_eq!(handle.wait().await, SequenceOutcome::Completed);

    let taps = target.recorded().await.taps;
    assert_eq!(taps, CategoryId::from("food-dairy-milk").tap_sequence());
}

#[tokio::test(start_paused = true)]
async fn tap_sequence_proceeds_after_bounded_readiness_poll() {
    let target = FakeTarget::new(false);
    let sequencer = sequencer(target.clone());

    let started = tokio::time::Instant::now();
    let handle = sequencer.run_tap_sequence(CategoryId::from("music-music"), ms(0), ms(0));
    assert_eq!(handle.wait().await, SequenceOutcome::Completed);

    // three polls ten milliseconds apart, then the walk goes ahead anyway
    assert!(started.elapsed() >= ms(30));
    assert_eq!(target.recorded().await.taps, vec![CategoryId::from("music-music")]);
}

#[tokio::test(start_paused = true)]
async fn tap_sequence_cancelled_mid_walk_stops_tapping() {
    let target = FakeTarget::new(true);
    let sequencer = sequencer(target.clone());

    let handle = sequencer.run_tap_sequence(CategoryId::from("food-dairy-milk"), ms(0), ms(50));
    tokio::time::sleep(ms(60)).await;
    sequencer.cancel(Channel::Tap);
    assert_eq!(handle.wait().await, SequenceOutcome::Cancelled);

    let taps = target.recorded().await.taps;
    tokio::time::sleep(ms(500)).await;
    assert_eq!(target.recorded().await.taps, taps);
    assert_eq!(taps.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn primitives_report_start_and_finish() {
    let target = FakeTarget::new(true);
    let sequencer = sequencer(target.clone());
    let mut events = sequencer.subscribe_events();

    let task = SequenceTask::EraseText(TextField::Name);
    sequencer.erase_text(TextField::Name, ms(1)).wait().await;

    assert_eq!(events.recv().await.expect("started"), SequenceEvent::Started(task));
    assert_eq!(
        events.recv().await.expect("finished"),
        SequenceEvent::Finished {
            task,
            outcome: SequenceOutcome::Completed,
        }
    );
}

#[tokio::test(start_paused = true)]
async fn autofill_resets_then_fills_every_field() {
    let target = FakeTarget::new(true);
    target.state.lock().await.name = "stale".into();
    let sequencer = sequencer(target.clone());

    let handle = sequencer.start_autofill();
    assert_eq!(handle.task(), SequenceTask::Autofill);
    assert_eq!(handle.wait().await, SequenceOutcome::Completed);

    let recorded = target.recorded().await;
    assert_eq!(recorded.resets, 1);
    let prompt = sequencer
        .samples()
        .prompts
        .iter()
        .find(|prompt| prompt.name == recorded.name)
        .expect("typed name comes from the catalogue");
    assert_eq!(recorded.taps, prompt.category.tap_sequence());
    assert_eq!(recorded.description, "Ranked by smell");
    assert_eq!(recorded.layout.as_deref(), Some(DEFAULT_LAYOUT));
}

#[tokio::test(start_paused = true)]
async fn cancelling_autofill_stops_every_channel_it_owns() {
    let target = FakeTarget::new(true);
    let sequencer = sequencer(target.clone());

    let handle = sequencer.start_autofill();
    tokio::time::sleep(ms(45)).await;
    handle.cancel();
    assert_eq!(handle.wait().await, SequenceOutcome::Cancelled);

    let frozen = target.recorded().await;
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(target.recorded().await, frozen);
    assert_eq!(frozen.layout, None);
}

#[tokio::test(start_paused = true)]
async fn human_typing_on_a_flow_channel_aborts_the_flow() {
    let target = FakeTarget::new(true);
    let sequencer = sequencer(target.clone());

    let autofill = sequencer.start_autofill();
    tokio::time::sleep(ms(25)).await;
    sequencer.cancel(Channel::Name);

    assert_eq!(autofill.wait().await, SequenceOutcome::Cancelled);
    assert!(target.recorded().await.taps.is_empty());
}

#[tokio::test(start_paused = true)]
async fn tutorial_repeats_until_the_step_changes() {
    let target = FakeTarget::new(true);
    let sequencer = sequencer(target.clone());
    let mut events = sequencer.subscribe_events();

    let handle = sequencer.start_tutorial(TextField::Name, WizardStep::Name);
    tokio::time::sleep(Duration::from_secs(2)).await;
    *target.step.lock() = WizardStep::Description;
    assert_eq!(handle.wait().await, SequenceOutcome::Completed);

    let mut typed = 0;
    while let Ok(event) = events.try_recv() {
        if event
            == (SequenceEvent::Finished {
                task: SequenceTask::TypeText(TextField::Name),
                outcome: SequenceOutcome::Completed,
            })
        {
            typed += 1;
        }
    }
    assert!(typed >= 2, "tutorial typed only {typed} names");
}

#[tokio::test(start_paused = true)]
async fn starting_autofill_cancels_a_running_tutorial() {
    let target = FakeTarget::new(true);
    let sequencer = sequencer(target.clone());

    let tutorial = sequencer.start_tutorial(TextField::Name, WizardStep::Name);
    tokio::time::sleep(ms(30)).await;
    let autofill = sequencer.start_autofill();

    assert_eq!(tutorial.wait().await, SequenceOutcome::Cancelled);
    assert_eq!(autofill.wait().await, SequenceOutcome::Completed);
}

#[tokio::test(start_paused = true)]
async fn same_seed_gives_same_autofill() {
    let first = FakeTarget::new(true);
    let second = FakeTarget::new(true);

    sequencer(first.clone()).start_autofill().wait().await;
    sequencer(second.clone()).start_autofill().wait().await;

    assert_eq!(first.recorded().await, second.recorded().await);
}

#[test]
fn timings_deserialize_over_defaults() {
    let timings: SequencerTimings =
        serde_json::from_str(r#"{"typing_per_char_ms": 5}"#).expect("timings");
    assert_eq!(timings.typing_per_char(), ms(5));
    assert_eq!(timings.tap_step(), SequencerTimings::default().tap_step());
}
