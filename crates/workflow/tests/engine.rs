use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tempfile::tempdir;
use toolforge_workflow::{
    CheckpointStore, FnStep, Graph, InMemoryCheckpointStore, JsonDirCheckpointStore, Next,
    Position, RunOutcome, StepError, StepHandler, StepId, Workflow, WorkflowError, WorkflowState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Step {
    Prepare,
    Work,
    Review,
    Finish,
}

impl StepId for Step {
    fn name(self) -> &'static str {
        match self {
            Step::Prepare => "prepare",
            Step::Work => "work",
            Step::Review => "review",
            Step::Finish => "finish",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "prepare" => Some(Step::Prepare),
            "work" => Some(Step::Work),
            "review" => Some(Step::Review),
            "finish" => Some(Step::Finish),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Job {
    fast: bool,
    log: Vec<String>,
    approved: Option<bool>,
}

impl WorkflowState for Job {
    type Update = bool;

    fn apply(&mut self, update: bool) {
        self.approved = Some(update);
    }
}

fn record(name: &'static str) -> impl StepHandler<Job> {
    FnStep(move |mut job: Job| async move {
        job.log.push(name.to_string());
        Ok::<_, StepError>(job)
    })
}

fn speed(job: &Job) -> &'static str {
    if job.fast { "fast" } else { "slow" }
}

struct FlakyWork {
    fail: Arc<AtomicBool>,
}

#[async_trait::async_trait]
impl StepHandler<Job> for FlakyWork {
    async fn run(&self, mut job: Job) -> Result<Job, StepError> {
        if self.fail.swap(false, Ordering::SeqCst) {
            return Err(StepError::Failed("transient".to_string()));
        }
        job.log.push("work".to_string());
        Ok(job)
    }
}

fn graph_with_work(work: impl StepHandler<Job> + 'static) -> Graph<Step, Job> {
    Graph::builder("job", Step::Prepare)
        .step(Step::Prepare, record("prepare"))
        .step(Step::Work, work)
        .step(Step::Review, record("review"))
        .step(Step::Finish, record("finish"))
        .branch(
            Step::Prepare,
            speed,
            [
                ("fast", Next::Step(Step::Finish)),
                ("slow", Next::Step(Step::Work)),
            ],
        )
        .edge(Step::Work, Next::Step(Step::Review))
        .edge(Step::Review, Next::Step(Step::Finish))
        .edge(Step::Finish, Next::End)
        .interrupt_before(Step::Review)
        .build()
        .unwrap()
}

fn graph() -> Graph<Step, Job> {
    graph_with_work(record("work"))
}

#[tokio::test]
async fn suspends_before_interrupt_and_resume_without_update_is_a_no_op() {
    let store = Arc::new(InMemoryCheckpointStore::new());
    let wf = Workflow::new(graph(), store.clone());

    let outcome = wf.start("t1", Job::default()).await.unwrap();
    let RunOutcome::Suspended { at, snapshot } = outcome else {
        panic!("expected suspension");
    };
    assert_eq!(at, Step::Review);
    assert_eq!(snapshot.state.log, vec!["prepare", "work"]);
    assert_eq!(snapshot.trail, vec![Step::Prepare, Step::Work]);

    let stored_version = store.load("t1").await.unwrap().unwrap().version;
    let again = wf.resume("t1", None).await.unwrap();
    let RunOutcome::Suspended { at, snapshot: same } = again else {
        panic!("expected suspension");
    };
    assert_eq!(at, Step::Review);
    assert_eq!(same.state, snapshot.state);
    assert_eq!(same.version, snapshot.version);
    assert_eq!(store.load("t1").await.unwrap().unwrap().version, stored_version);
}

#[tokio::test]
async fn resume_with_update_completes_and_repeat_is_a_no_op() {
    let wf = Workflow::new(graph(), Arc::new(InMemoryCheckpointStore::new()));
    wf.start("t2", Job::default()).await.unwrap();

    let done = wf.resume("t2", Some(true)).await.unwrap();
    assert!(done.is_completed());
    let snapshot = done.snapshot().clone();
    assert_eq!(snapshot.position, Position::Terminal);
    assert_eq!(snapshot.state.approved, Some(true));
    assert_eq!(
        snapshot.state.log,
        vec!["prepare", "work", "review", "finish"]
    );

    let repeat = wf.resume("t2", Some(true)).await.unwrap();
    assert!(repeat.is_completed());
    assert_eq!(repeat.snapshot().version, snapshot.version);
    assert_eq!(repeat.into_state(), snapshot.state);
}

#[tokio::test]
async fn branch_skips_interrupt_on_fast_path() {
    let wf = Workflow::new(graph(), Arc::new(InMemoryCheckpointStore::new()));
    let job = Job {
        fast: true,
        ..Job::default()
    };
    let outcome = wf.start("t3", job).await.unwrap();
    assert!(outcome.is_completed());
    assert_eq!(outcome.into_state().log, vec!["prepare", "finish"]);
}

#[tokio::test]
async fn failed_step_keeps_last_checkpoint_and_can_be_resumed() {
    let fail = Arc::new(AtomicBool::new(true));
    let wf = Workflow::new(
        graph_with_work(FlakyWork {
            fail: Arc::clone(&fail),
        }),
        Arc::new(InMemoryCheckpointStore::new()),
    );

    let err = wf.start("t4", Job::default()).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Step { step: "work", .. }));
    assert!(!err.is_input_error());

    let snapshot = wf.snapshot("t4").await.unwrap().unwrap();
    assert_eq!(snapshot.position, Position::At(Step::Work));
    assert_eq!(snapshot.state.log, vec!["prepare"]);

    let outcome = wf.resume("t4", None).await.unwrap();
    assert!(matches!(outcome, RunOutcome::Suspended { at: Step::Review, .. }));
}

#[tokio::test]
async fn json_dir_store_survives_a_new_engine() {
    let dir = tempdir().unwrap();
    let first = Workflow::new(graph(), Arc::new(JsonDirCheckpointStore::new(dir.path())));
    first.start("t5", Job::default()).await.unwrap();
    drop(first);

    let second = Workflow::new(graph(), Arc::new(JsonDirCheckpointStore::new(dir.path())));
    let outcome = second.resume("t5", Some(false)).await.unwrap();
    assert!(outcome.is_completed());
    assert_eq!(outcome.into_state().approved, Some(false));
}

#[tokio::test]
async fn unknown_thread_and_foreign_graph_are_errors() {
    let store: Arc<dyn CheckpointStore> = Arc::new(InMemoryCheckpointStore::new());
    let wf = Workflow::new(graph(), Arc::clone(&store));
    assert!(matches!(
        wf.resume("missing", None).await,
        Err(WorkflowError::UnknownThread(_))
    ));

    wf.start("shared", Job::default()).await.unwrap();
    let other = Graph::builder("other", Step::Prepare)
        .step(Step::Prepare, record("prepare"))
        .edge(Step::Prepare, Next::End)
        .build()
        .unwrap();
    let other = Workflow::new(other, store);
    assert!(matches!(
        other.resume("shared", None).await,
        Err(WorkflowError::GraphMismatch { .. })
    ));
}

#[tokio::test]
async fn start_replaces_previous_run() {
    let wf = Workflow::new(graph(), Arc::new(InMemoryCheckpointStore::new()));
    wf.start("t6", Job::default()).await.unwrap();
    wf.resume("t6", Some(true)).await.unwrap();

    let outcome = wf.start("t6", Job::default()).await.unwrap();
    assert!(matches!(outcome, RunOutcome::Suspended { .. }));
    assert_eq!(outcome.snapshot().state.approved, None);
}

#[tokio::test]
async fn step_limit_stops_cycles() {
    let cyclic = Graph::builder("loop", Step::Prepare)
        .step(Step::Prepare, record("prepare"))
        .step(Step::Work, record("work"))
        .edge(Step::Prepare, Next::Step(Step::Work))
        .edge(Step::Work, Next::Step(Step::Prepare))
        .build()
        .unwrap();
    let wf = Workflow::new(cyclic, Arc::new(InMemoryCheckpointStore::new())).with_step_limit(5);
    assert!(matches!(
        wf.start("t7", Job::default()).await,
        Err(WorkflowError::StepLimit(5))
    ));
}
