use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::{
    env,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{sync::Notify, time::sleep};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use uuid::Uuid;

const POLLER_VERSION: &str = env!("CARGO_PKG_VERSION");

// Per-modality polling cadence. Video renders are quicker than avatar
// renders, so they tick faster but give up sooner.
const VIDEO_POLL_INTERVAL_SECS: u64 = 5;
const VIDEO_MAX_ATTEMPTS: u32 = 60;
const AVATAR_POLL_INTERVAL_SECS: u64 = 8;
const AVATAR_MAX_ATTEMPTS: u32 = 75;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobKind {
    Video,
    Avatar,
}

impl JobKind {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "video" => Some(JobKind::Video),
            "avatar" => Some(JobKind::Avatar),
            _ => None,
        }
    }

    fn schedule(&self) -> PollSchedule {
        match self {
            JobKind::Video => PollSchedule {
                interval: Duration::from_secs(VIDEO_POLL_INTERVAL_SECS),
                max_attempts: VIDEO_MAX_ATTEMPTS,
            },
            JobKind::Avatar => PollSchedule {
                interval: Duration::from_secs(AVATAR_POLL_INTERVAL_SECS),
                max_attempts: AVATAR_MAX_ATTEMPTS,
            },
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PollSchedule {
    interval: Duration,
    max_attempts: u32,
}

#[derive(Debug, Clone)]
struct PollerConfig {
    service_url: String,
    user_id: String,
    user_email: String,
    kind: JobKind,
    prompt: String,
    model: String,
    ratio: String,
    duration: u32,
    avatar_id: String,
    voice_id: String,
    dimension: String,
}

#[derive(Debug, Deserialize, Serialize, Default, Clone)]
struct FileConfig {
    service_url: Option<String>,
    user_id: Option<String>,
    user_email: Option<String>,
    kind: Option<String>,
    prompt: Option<String>,
    model: Option<String>,
    ratio: Option<String>,
    duration: Option<u32>,
    avatar_id: Option<String>,
    voice_id: Option<String>,
    dimension: Option<String>,
}

#[derive(Clone)]
struct StopSignal {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl StopSignal {
    fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    fn stop(&self) {
        self.flag.store(true, Ordering::Relaxed);
        self.notify.notify_waiters();
    }

    fn stopped(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    async fn sleep_or_stop(&self, duration: Duration) -> bool {
        if self.stopped() {
            return true;
        }
        tokio::select! {
            _ = sleep(duration) => false,
            _ = self.notify.notified() => true,
        }
    }
}

// ---- wire types -----------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    #[serde(default)]
    task_id: Option<String>,
    #[serde(default)]
    video_id: Option<String>,
    #[serde(default)]
    generation_id: Option<Uuid>,
    #[serde(default)]
    cost: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PollBody {
    status: String,
    video_url: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
    code: String,
}

#[derive(Debug, Clone)]
struct SubmittedJob {
    kind: JobKind,
    provider_ref: String,
    generation_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq)]
struct PollStatus {
    status: JobStatus,
    video_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    fn parse(value: &str) -> Self {
        match value {
            "pending" => JobStatus::Pending,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            _ => JobStatus::Processing,
        }
    }
}

/// Poll-side failure split by how the loop should react: configuration
/// problems abort the job, everything else is retried on the next tick.
#[derive(Debug, Clone, PartialEq)]
enum PollError {
    Config(String),
    Transient(String),
}

// ---- the polling state machine --------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum PollOutcome {
    Completed { video_url: Option<String> },
    Failed { reason: String },
    TimedOut,
}

/// Pure attempt-counting core of the polling loop. One instance per job;
/// feeding it each tick's result keeps the progress and give-up rules in
/// one place, independent of timers and HTTP.
struct PollLoop {
    schedule: PollSchedule,
    attempts: u32,
    progress: u8,
}

impl PollLoop {
    fn new(schedule: PollSchedule) -> Self {
        Self {
            schedule,
            attempts: 0,
            progress: 0,
        }
    }

    fn progress(&self) -> u8 {
        self.progress
    }

    fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Advance one tick. Progress climbs with attempts but is pinned
    /// below 100 until the job actually completes.
    fn on_tick(&mut self, result: Result<PollStatus, PollError>) -> Option<PollOutcome> {
        self.attempts += 1;
        match result {
            Ok(poll) => match poll.status {
                JobStatus::Completed => {
                    self.progress = 100;
                    Some(PollOutcome::Completed {
                        video_url: poll.video_url,
                    })
                }
                JobStatus::Failed => Some(PollOutcome::Failed {
                    reason: "provider reported failure".to_string(),
                }),
                JobStatus::Pending | JobStatus::Processing => self.advance_or_time_out(),
            },
            Err(PollError::Config(message)) => Some(PollOutcome::Failed { reason: message }),
            Err(PollError::Transient(message)) => {
                tracing::warn!(error = %message, "poll attempt failed, retrying");
                self.advance_or_time_out()
            }
        }
    }

    fn advance_or_time_out(&mut self) -> Option<PollOutcome> {
        let estimated =
            (f64::from(self.attempts) / f64::from(self.schedule.max_attempts) * 100.0).round();
        self.progress = (estimated as u8).min(95);
        if self.attempts >= self.schedule.max_attempts {
            Some(PollOutcome::TimedOut)
        } else {
            None
        }
    }
}

// ---- the HTTP seam --------------------------------------------------------

trait JobApi {
    fn submit<'a>(
        &'a self,
        config: &'a PollerConfig,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<SubmittedJob, PollError>> + Send + 'a>>;

    fn poll<'a>(
        &'a self,
        job: &'a SubmittedJob,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<PollStatus, PollError>> + Send + 'a>>;
}

struct HttpJobApi {
    client: Client,
    base_url: String,
    user_id: String,
    user_email: String,
}

impl HttpJobApi {
    fn new(config: &PollerConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.service_url.trim_end_matches('/').to_string(),
            user_id: config.user_id.clone(),
            user_email: config.user_email.clone(),
        }
    }

    fn identified(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("x-user-id", &self.user_id)
            .header("x-user-email", &self.user_email)
    }

    async fn read_error(response: reqwest::Response) -> PollError {
        let status = response.status();
        match response.json::<ErrorBody>().await {
            Ok(body) if body.code == "CONFIG_ERROR" => PollError::Config(body.error),
            Ok(body) => PollError::Transient(format!("{status}: {}", body.error)),
            Err(_) => PollError::Transient(format!("unexpected response: {status}")),
        }
    }
}

impl JobApi for HttpJobApi {
    fn submit<'a>(
        &'a self,
        config: &'a PollerConfig,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<SubmittedJob, PollError>> + Send + 'a>>
    {
        Box::pin(async move {
            let (path, body) = match config.kind {
                JobKind::Video => (
                    "/v1/generate/video",
                    serde_json::json!({
                        "prompt": config.prompt,
                        "model": config.model,
                        "ratio": config.ratio,
                        "duration": config.duration,
                    }),
                ),
                JobKind::Avatar => (
                    "/v1/generate/avatar",
                    serde_json::json!({
                        "text": config.prompt,
                        "avatarId": config.avatar_id,
                        "voiceId": config.voice_id,
                        "dimension": config.dimension,
                    }),
                ),
            };

            let response = self
                .identified(self.client.post(format!("{}{path}", self.base_url)))
                .json(&body)
                .send()
                .await
                .map_err(|err| PollError::Transient(err.to_string()))?;

            if !response.status().is_success() {
                return Err(Self::read_error(response).await);
            }

            let submitted: SubmitResponse = response
                .json()
                .await
                .map_err(|err| PollError::Transient(err.to_string()))?;
            let provider_ref = match config.kind {
                JobKind::Video => submitted.task_id,
                JobKind::Avatar => submitted.video_id,
            }
            .ok_or_else(|| {
                PollError::Transient("submit response carried no job reference".to_string())
            })?;

            tracing::info!(
                job = provider_ref.as_str(),
                cost = submitted.cost,
                "job submitted"
            );
            Ok(SubmittedJob {
                kind: config.kind,
                provider_ref,
                generation_id: submitted.generation_id,
            })
        })
    }

    fn poll<'a>(
        &'a self,
        job: &'a SubmittedJob,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<PollStatus, PollError>> + Send + 'a>>
    {
        Box::pin(async move {
            let (path, ref_param) = match job.kind {
                JobKind::Video => ("/v1/generate/video/poll", "taskId"),
                JobKind::Avatar => ("/v1/generate/avatar/poll", "videoId"),
            };
            let mut query = vec![(ref_param, job.provider_ref.clone())];
            if let Some(generation_id) = job.generation_id {
                query.push(("generationId", generation_id.to_string()));
            }

            let response = self
                .identified(self.client.get(format!("{}{path}", self.base_url)))
                .query(&query)
                .send()
                .await
                .map_err(|err| PollError::Transient(err.to_string()))?;

            if !response.status().is_success() {
                return Err(Self::read_error(response).await);
            }

            let body: PollBody = response
                .json()
                .await
                .map_err(|err| PollError::Transient(err.to_string()))?;
            Ok(PollStatus {
                status: JobStatus::parse(&body.status),
                video_url: body.video_url,
            })
        })
    }
}

/// Drive one job to a terminal outcome, ticking on the kind's cadence.
async fn run_job(
    api: &(dyn JobApi + Send + Sync),
    config: &PollerConfig,
    stop: &StopSignal,
) -> Option<PollOutcome> {
    let job = match api.submit(config).await {
        Ok(job) => job,
        Err(PollError::Config(message)) => {
            return Some(PollOutcome::Failed { reason: message });
        }
        Err(PollError::Transient(message)) => {
            return Some(PollOutcome::Failed { reason: message });
        }
    };

    let schedule = config.kind.schedule();
    let mut poll_loop = PollLoop::new(schedule);

    loop {
        if stop.sleep_or_stop(schedule.interval).await {
            return None;
        }
        let outcome = poll_loop.on_tick(api.poll(&job).await);
        tracing::info!(
            attempt = poll_loop.attempts(),
            progress = poll_loop.progress(),
            "poll tick"
        );
        if let Some(outcome) = outcome {
            return Some(outcome);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_ansi(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn resolve_config_path() -> PathBuf {
    env::var("POLLER_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("poller.toml"))
}

fn load_config() -> Result<PollerConfig, String> {
    let config_path = resolve_config_path();

    let file_config = if config_path.exists() {
        let content =
            std::fs::read_to_string(&config_path).map_err(|err| format!("read config: {err}"))?;
        toml::from_str::<FileConfig>(&content).map_err(|err| format!("parse config: {err}"))?
    } else {
        FileConfig::default()
    };

    let service_url = env::var("SERVICE_URL")
        .ok()
        .or(file_config.service_url.clone())
        .unwrap_or_else(|| "http://localhost:8080".to_string());
    let user_id = env::var("USER_ID")
        .ok()
        .or(file_config.user_id.clone())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let user_email = env::var("USER_EMAIL")
        .ok()
        .or(file_config.user_email.clone())
        .unwrap_or_else(|| "poller@localhost".to_string());
    let kind = env::var("JOB_KIND")
        .ok()
        .or(file_config.kind.clone())
        .unwrap_or_else(|| "video".to_string());
    let kind = JobKind::parse(&kind).ok_or_else(|| format!("unknown job kind: {kind}"))?;
    let prompt = env::var("JOB_PROMPT")
        .ok()
        .or(file_config.prompt.clone())
        .ok_or_else(|| "prompt is required".to_string())?;
    let model = env::var("JOB_MODEL")
        .ok()
        .or(file_config.model.clone())
        .unwrap_or_else(|| "gen4_turbo".to_string());
    let ratio = env::var("JOB_RATIO")
        .ok()
        .or(file_config.ratio.clone())
        .unwrap_or_else(|| "1280:720".to_string());
    let duration = env::var("JOB_DURATION")
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
        .or(file_config.duration)
        .unwrap_or(5);
    let avatar_id = env::var("JOB_AVATAR_ID")
        .ok()
        .or(file_config.avatar_id.clone())
        .unwrap_or_else(|| "Anna_public_3_20240108".to_string());
    let voice_id = env::var("JOB_VOICE_ID")
        .ok()
        .or(file_config.voice_id.clone())
        .unwrap_or_else(|| "21m00Tcm4TlvDq8ikWAM".to_string());
    let dimension = env::var("JOB_DIMENSION")
        .ok()
        .or(file_config.dimension.clone())
        .unwrap_or_else(|| "16:9".to_string());

    Ok(PollerConfig {
        service_url,
        user_id,
        user_email,
        kind,
        prompt,
        model,
        ratio,
        duration,
        avatar_id,
        voice_id,
        dimension,
    })
}

#[tokio::main]
async fn main() {
    init_tracing();
    tracing::info!(version = POLLER_VERSION, "poller starting");

    // Load config from file and env; env wins.
    let config = match load_config() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "failed to load config");
            return;
        }
    };

    let stop = StopSignal::new();
    {
        let stop = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                stop.stop();
            }
        });
    }

    let api = HttpJobApi::new(&config);
    match run_job(&api, &config, &stop).await {
        Some(PollOutcome::Completed { video_url }) => {
            tracing::info!(url = video_url.as_deref().unwrap_or(""), "job completed");
        }
        Some(PollOutcome::Failed { reason }) => {
            tracing::error!(reason = %reason, "job failed");
        }
        Some(PollOutcome::TimedOut) => {
            tracing::error!("job timed out before completing");
        }
        None => {
            tracing::info!("stopped before the job finished");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn processing() -> Result<PollStatus, PollError> {
        Ok(PollStatus {
            status: JobStatus::Processing,
            video_url: None,
        })
    }

    fn completed(url: &str) -> Result<PollStatus, PollError> {
        Ok(PollStatus {
            status: JobStatus::Completed,
            video_url: Some(url.to_string()),
        })
    }

    #[test]
    fn schedules_differ_by_kind() {
        let video = JobKind::Video.schedule();
        assert_eq!(video.interval, Duration::from_secs(5));
        assert_eq!(video.max_attempts, 60);

        let avatar = JobKind::Avatar.schedule();
        assert_eq!(avatar.interval, Duration::from_secs(8));
        assert_eq!(avatar.max_attempts, 75);
    }

    #[test]
    fn progress_is_monotonic_and_capped_below_completion() {
        let mut poll_loop = PollLoop::new(JobKind::Video.schedule());
        let mut last = 0u8;
        for _ in 0..59 {
            assert_eq!(poll_loop.on_tick(processing()), None);
            let progress = poll_loop.progress();
            assert!(progress >= last);
            assert!(progress <= 95);
            last = progress;
        }
    }

    #[test]
    fn times_out_at_exactly_the_attempt_ceiling() {
        let mut poll_loop = PollLoop::new(JobKind::Video.schedule());
        for _ in 0..59 {
            assert_eq!(poll_loop.on_tick(processing()), None);
        }
        assert_eq!(poll_loop.on_tick(processing()), Some(PollOutcome::TimedOut));
        assert_eq!(poll_loop.attempts(), 60);
    }

    #[test]
    fn completion_sets_progress_to_one_hundred() {
        let mut poll_loop = PollLoop::new(JobKind::Avatar.schedule());
        assert_eq!(poll_loop.on_tick(processing()), None);
        let outcome = poll_loop.on_tick(completed("https://cdn.example/clip.mp4"));
        assert_eq!(
            outcome,
            Some(PollOutcome::Completed {
                video_url: Some("https://cdn.example/clip.mp4".to_string()),
            })
        );
        assert_eq!(poll_loop.progress(), 100);
    }

    #[test]
    fn config_errors_abort_on_the_first_tick() {
        let mut poll_loop = PollLoop::new(JobKind::Video.schedule());
        let outcome = poll_loop.on_tick(Err(PollError::Config(
            "RUNWAY_API_KEY is not configured.".to_string(),
        )));
        assert_eq!(
            outcome,
            Some(PollOutcome::Failed {
                reason: "RUNWAY_API_KEY is not configured.".to_string(),
            })
        );
        assert_eq!(poll_loop.attempts(), 1);
    }

    #[test]
    fn transient_errors_are_swallowed_but_still_count() {
        let mut poll_loop = PollLoop::new(JobKind::Video.schedule());
        assert_eq!(poll_loop.on_tick(processing()), None);
        let before = poll_loop.progress();
        assert_eq!(
            poll_loop.on_tick(Err(PollError::Transient("503".to_string()))),
            None
        );
        assert!(poll_loop.progress() >= before);
        assert_eq!(poll_loop.attempts(), 2);

        // A burst of failures eventually exhausts the attempt budget.
        for _ in 0..57 {
            assert_eq!(
                poll_loop.on_tick(Err(PollError::Transient("503".to_string()))),
                None
            );
        }
        assert_eq!(
            poll_loop.on_tick(Err(PollError::Transient("503".to_string()))),
            Some(PollOutcome::TimedOut)
        );
    }

    #[test]
    fn provider_failure_is_terminal() {
        let mut poll_loop = PollLoop::new(JobKind::Avatar.schedule());
        let outcome = poll_loop.on_tick(Ok(PollStatus {
            status: JobStatus::Failed,
            video_url: None,
        }));
        assert!(matches!(outcome, Some(PollOutcome::Failed { .. })));
    }

    #[test]
    fn unknown_status_strings_poll_again() {
        assert_eq!(JobStatus::parse("pending"), JobStatus::Pending);
        assert_eq!(JobStatus::parse("completed"), JobStatus::Completed);
        assert_eq!(JobStatus::parse("failed"), JobStatus::Failed);
        assert_eq!(JobStatus::parse("enqueued"), JobStatus::Processing);
    }

    struct ScriptedApi {
        responses: Mutex<Vec<Result<PollStatus, PollError>>>,
    }

    impl JobApi for ScriptedApi {
        fn submit<'a>(
            &'a self,
            _config: &'a PollerConfig,
        ) -> std::pin::Pin<
            Box<dyn std::future::Future<Output = Result<SubmittedJob, PollError>> + Send + 'a>,
        > {
            Box::pin(async move {
                Ok(SubmittedJob {
                    kind: JobKind::Video,
                    provider_ref: "task-1".to_string(),
                    generation_id: None,
                })
            })
        }

        fn poll<'a>(
            &'a self,
            _job: &'a SubmittedJob,
        ) -> std::pin::Pin<
            Box<dyn std::future::Future<Output = Result<PollStatus, PollError>> + Send + 'a>,
        > {
            Box::pin(async move {
                let mut responses = self.responses.lock().unwrap();
                if responses.is_empty() {
                    processing()
                } else {
                    responses.remove(0)
                }
            })
        }
    }

    fn test_config() -> PollerConfig {
        PollerConfig {
            service_url: "http://localhost:8080".to_string(),
            user_id: "user-1".to_string(),
            user_email: "dev@example.com".to_string(),
            kind: JobKind::Video,
            prompt: "A drone over mountains at sunrise".to_string(),
            model: "gen4_turbo".to_string(),
            ratio: "1280:720".to_string(),
            duration: 5,
            avatar_id: String::new(),
            voice_id: String::new(),
            dimension: String::new(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn run_job_drives_a_scripted_job_to_completion() {
        let api = ScriptedApi {
            responses: Mutex::new(vec![
                processing(),
                processing(),
                completed("https://cdn.example/clip.mp4"),
            ]),
        };
        let stop = StopSignal::new();
        let outcome = run_job(&api, &test_config(), &stop).await;
        assert_eq!(
            outcome,
            Some(PollOutcome::Completed {
                video_url: Some("https://cdn.example/clip.mp4".to_string()),
            })
        );
    }

    #[tokio::test]
    async fn stop_signal_interrupts_the_loop() {
        let api = ScriptedApi {
            responses: Mutex::new(vec![]),
        };
        let stop = StopSignal::new();
        stop.stop();
        let outcome = run_job(&api, &test_config(), &stop).await;
        assert_eq!(outcome, None);
    }
}
