use anyhow::Result;
use chrono::{DateTime, Datelike, Days, Duration as ChronoDuration, NaiveTime, Utc, Weekday};
use std::time::Duration;
use tokio::time::sleep;

use crate::core::friendship::{FriendshipService, SocialGraph};
use crate::models::JobKind;
use crate::pacing::Pacer;
use crate::queue::{Publisher, TweetService};

/// When a trigger repeats: every day, or once a week on a fixed day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recurrence {
    Daily,
    Weekly(Weekday),
}

/// One trigger of the schedule: a recurrence, a UTC time of day and the
/// job to run. Defined once at startup, immutable afterwards. Several
/// entries may target the same job kind; that is how follow volume gets
/// spread across the week.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub recurrence: Recurrence,
    pub time: NaiveTime,
    pub job: JobKind,
}

impl ScheduleEntry {
    pub fn daily(hour: u32, minute: u32, job: JobKind) -> Self {
        ScheduleEntry {
            recurrence: Recurrence::Daily,
            time: NaiveTime::from_hms_opt(hour, minute, 0).expect("valid schedule time"),
            job,
        }
    }

    pub fn weekly(weekday: Weekday, hour: u32, minute: u32, job: JobKind) -> Self {
        ScheduleEntry {
            recurrence: Recurrence::Weekly(weekday),
            time: NaiveTime::from_hms_opt(hour, minute, 0).expect("valid schedule time"),
            job,
        }
    }
}

/// First firing instant strictly after `after`.
pub fn next_occurrence(after: DateTime<Utc>, entry: &ScheduleEntry) -> DateTime<Utc> {
    let date = after.date_naive();
    match entry.recurrence {
        Recurrence::Daily => {
            let candidate = date.and_time(entry.time).and_utc();
            if candidate > after {
                candidate
            } else {
                (date + Days::new(1)).and_time(entry.time).and_utc()
            }
        }
        Recurrence::Weekly(weekday) => {
            let days_ahead = (weekday.num_days_from_monday() + 7
                - date.weekday().num_days_from_monday())
                % 7;
            let candidate = (date + Days::new(u64::from(days_ahead)))
                .and_time(entry.time)
                .and_utc();
            if candidate > after {
                candidate
            } else {
                candidate + ChronoDuration::days(7)
            }
        }
    }
}

struct Trigger {
    entry: ScheduleEntry,
    next_due: DateTime<Utc>,
}

/// The set of registered triggers, each tracking its own next-due
/// instant. Collecting due jobs advances those instants, so a trigger
/// fires once per recurrence window no matter how often (or how late)
/// the loop polls.
#[derive(Default)]
pub struct Timetable {
    triggers: Vec<Trigger>,
}

impl Timetable {
    pub fn new() -> Self {
        Timetable::default()
    }

    pub fn register(&mut self, entry: ScheduleEntry, now: DateTime<Utc>) {
        let next_due = next_occurrence(now, &entry);
        self.triggers.push(Trigger { entry, next_due });
    }

    /// Jobs whose trigger time has passed since the last check. Each
    /// returned trigger is advanced past `now` before this returns.
    pub fn due(&mut self, now: DateTime<Utc>) -> Vec<JobKind> {
        let mut jobs = Vec::new();
        for trigger in &mut self.triggers {
            if trigger.next_due <= now {
                jobs.push(trigger.entry.job);
                trigger.next_due = next_occurrence(now, &trigger.entry);
            }
        }
        jobs
    }
}

/// The weekly plan the bot ships with:
///
/// ```text
/// S  M  T  W  Th F  S
/// c  p  c     c     c     09:00 (p at 02:00)
/// c     c     c     c     15:00
/// c  p  c  p  c  p  c     21:00 (p at 22:00)
/// t  t  t  t  t  t  t     13:00
/// ```
pub fn default_schedule() -> Vec<ScheduleEntry> {
    let mut entries = Vec::new();

    // follow in three slots a day, four days a week, to stay inside the
    // daily follow cap
    for weekday in [Weekday::Sun, Weekday::Tue, Weekday::Thu, Weekday::Sat] {
        for hour in [9, 15, 21] {
            entries.push(ScheduleEntry::weekly(weekday, hour, 0, JobKind::Create));
        }
    }

    entries.push(ScheduleEntry::weekly(Weekday::Mon, 2, 0, JobKind::Purge));
    for weekday in [Weekday::Mon, Weekday::Wed, Weekday::Fri] {
        entries.push(ScheduleEntry::weekly(weekday, 22, 0, JobKind::Purge));
    }

    entries.push(ScheduleEntry::daily(13, 0, JobKind::Tweet));
    entries
}

/// Single-threaded polling loop driving the three jobs. Jobs run
/// synchronously on the loop, so a long purge delays later trigger
/// checks but never loses them.
pub struct Scheduler<G, Pc, P> {
    timetable: Timetable,
    friendship: FriendshipService<G, Pc>,
    tweets: TweetService<P>,
    poll_interval: Duration,
}

impl<G: SocialGraph, Pc: Pacer, P: Publisher> Scheduler<G, Pc, P> {
    pub fn new(
        friendship: FriendshipService<G, Pc>,
        tweets: TweetService<P>,
        poll_interval: Duration,
    ) -> Self {
        Scheduler {
            timetable: Timetable::new(),
            friendship,
            tweets,
            poll_interval,
        }
    }

    pub fn register(&mut self, entry: ScheduleEntry) {
        self.timetable.register(entry, Utc::now());
    }

    async fn run_job(&self, job: JobKind) -> Result<()> {
        match job {
            JobKind::Create => self.friendship.create().await,
            JobKind::Purge => self.friendship.purge().await,
            JobKind::Tweet => self.tweets.post_next().await,
        }
    }

    /// Poll forever. A failing job is logged and must not take the loop
    /// down; later triggers are unaffected.
    pub async fn run(&mut self) -> Result<()> {
        log::info!("scheduler started with {} triggers", self.timetable.triggers.len());
        loop {
            for job in self.timetable.due(Utc::now()) {
                log::info!("running {:?} job", job);
                match self.run_job(job).await {
                    Ok(()) => log::info!("{:?} job finished", job),
                    Err(e) => log::error!("{:?} job failed: {:#}", job, e),
                }
            }
            sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn daily_next_occurrence_rolls_to_tomorrow_after_the_slot() {
        let entry = ScheduleEntry::daily(13, 0, JobKind::Tweet);

        // before today's slot
        let next = next_occurrence(utc(2026, 8, 25, 9, 0, 0), &entry);
        assert_eq!(next, utc(2026, 8, 25, 13, 0, 0));

        // exactly at the slot is not "strictly after"
        let next = next_occurrence(utc(2026, 8, 25, 13, 0, 0), &entry);
        assert_eq!(next, utc(2026, 8, 26, 13, 0, 0));

        // past the slot
        let next = next_occurrence(utc(2026, 8, 25, 13, 0, 1), &entry);
        assert_eq!(next, utc(2026, 8, 26, 13, 0, 0));
    }

    #[test]
    fn weekly_next_occurrence_lands_on_the_right_weekday() {
        // 2026-08-23 is a Sunday
        let entry = ScheduleEntry::weekly(Weekday::Sun, 9, 0, JobKind::Create);

        // midweek jumps forward to Sunday
        let next = next_occurrence(utc(2026, 8, 26, 10, 0, 0), &entry);
        assert_eq!(next, utc(2026, 8, 30, 9, 0, 0));

        // a Sunday before 09:00 fires the same day
        let next = next_occurrence(utc(2026, 8, 23, 8, 59, 59), &entry);
        assert_eq!(next, utc(2026, 8, 23, 9, 0, 0));

        // a Sunday after 09:00 wraps a full week
        let next = next_occurrence(utc(2026, 8, 23, 9, 0, 0), &entry);
        assert_eq!(next, utc(2026, 8, 30, 9, 0, 0));
    }

    #[test]
    fn weekly_trigger_fires_once_per_week_under_tight_polling() {
        let mut timetable = Timetable::new();
        timetable.register(
            ScheduleEntry::weekly(Weekday::Sun, 9, 0, JobKind::Create),
            utc(2026, 8, 20, 0, 0, 0),
        );

        let mut fired = 0;
        // poll every second across the firing minute
        for second in 0..120 {
            let now = utc(2026, 8, 23, 8, 59, 0) + ChronoDuration::seconds(second);
            fired += timetable.due(now).len();
        }
        assert_eq!(fired, 1);

        // later the same day and later the same week: nothing
        assert!(timetable.due(utc(2026, 8, 23, 23, 0, 0)).is_empty());
        assert!(timetable.due(utc(2026, 8, 27, 9, 0, 0)).is_empty());

        // the following Sunday fires again, even on a late wakeup
        assert_eq!(timetable.due(utc(2026, 8, 30, 9, 20, 0)), vec![JobKind::Create]);
    }

    #[test]
    fn late_wakeup_fires_a_due_trigger_once() {
        let mut timetable = Timetable::new();
        timetable.register(
            ScheduleEntry::daily(13, 0, JobKind::Tweet),
            utc(2026, 8, 25, 0, 0, 0),
        );

        // the loop was blocked for hours past the slot
        assert_eq!(timetable.due(utc(2026, 8, 25, 19, 30, 0)), vec![JobKind::Tweet]);
        // the catch-up does not double-fire
        assert!(timetable.due(utc(2026, 8, 25, 19, 31, 0)).is_empty());
        // next day's slot is still on time
        assert_eq!(timetable.due(utc(2026, 8, 26, 13, 0, 0)), vec![JobKind::Tweet]);
    }

    #[test]
    fn multiple_entries_for_the_same_job_fire_independently() {
        let mut timetable = Timetable::new();
        let start = utc(2026, 8, 22, 0, 0, 0);
        timetable.register(ScheduleEntry::daily(9, 0, JobKind::Create), start);
        timetable.register(ScheduleEntry::daily(15, 0, JobKind::Create), start);

        assert_eq!(timetable.due(utc(2026, 8, 22, 9, 0, 0)), vec![JobKind::Create]);
        assert_eq!(timetable.due(utc(2026, 8, 22, 15, 0, 0)), vec![JobKind::Create]);
        // both at once after a very late wakeup
        assert_eq!(
            timetable.due(utc(2026, 8, 23, 16, 0, 0)),
            vec![JobKind::Create, JobKind::Create]
        );
    }

    #[test]
    fn default_schedule_matches_the_weekly_plan() {
        let entries = default_schedule();

        let creates = entries.iter().filter(|e| e.job == JobKind::Create).count();
        let purges = entries.iter().filter(|e| e.job == JobKind::Purge).count();
        let tweets = entries.iter().filter(|e| e.job == JobKind::Tweet).count();
        assert_eq!((creates, purges, tweets), (12, 4, 1));

        assert!(entries
            .iter()
            .any(|e| e.recurrence == Recurrence::Daily && e.job == JobKind::Tweet));
    }
}
