use crate::commitlog::{Log, LogError};
use crate::replica::ids::{LamportCounter, ServerId, NUM_SERVERS};
use crate::replica::update_log::{LogEvent, LogRecord};

/// UpdateLog is the durable record of every replicated event, as one append only log per origin
/// server. Within a log, records are ordered by lamport counter, which is also append order.
pub(crate) struct UpdateLog<L>
where
    L: Log<LogRecord>,
{
    // Index i holds the log for server i + 1.
    streams: Vec<L>,
}

impl<L> UpdateLog<L>
where
    L: Log<LogRecord>,
{
    /// Open one log per origin server using `open_stream`.
    pub(crate) fn open<F>(mut open_stream: F) -> Result<Self, LogError>
    where
        F: FnMut(ServerId) -> Result<L, LogError>,
    {
        let mut streams = Vec::with_capacity(NUM_SERVERS);
        for origin in ServerId::all() {
            streams.push(open_stream(origin)?);
        }

        Ok(UpdateLog { streams })
    }

    pub(crate) fn append(&mut self, event: &LogEvent) -> Result<(), LogError> {
        self.streams[event.origin.index()].append(event.record.clone())
    }

    pub(crate) fn latest_counter(&self, origin: ServerId) -> LamportCounter {
        LamportCounter::new(self.streams[origin.index()].latest_sequence() as u32)
    }

    /// All events from `origin` newer than `counter`, oldest first.
    pub(crate) fn scan_newer_than(&self, origin: ServerId, counter: LamportCounter) -> Result<Vec<LogEvent>, LogError> {
        let records = self.streams[origin.index()].scan_newer_than(counter.as_u32() as u64)?;
        Ok(Self::attach_origin(origin, records))
    }

    /// Same as `scan_newer_than()`, but at most `max_events`. Page by passing the last counter seen.
    pub(crate) fn read_batch(
        &self,
        origin: ServerId,
        counter: LamportCounter,
        max_events: usize,
    ) -> Result<Vec<LogEvent>, LogError> {
        let records = self.streams[origin.index()].read_batch(counter.as_u32() as u64, max_events)?;
        Ok(Self::attach_origin(origin, records))
    }

    pub(crate) fn replay_all(&self, origin: ServerId) -> Result<Vec<LogEvent>, LogError> {
        self.scan_newer_than(origin, LamportCounter::zero())
    }

    fn attach_origin(origin: ServerId, records: Vec<LogRecord>) -> Vec<LogEvent> {
        records
            .into_iter()
            .map(|record| LogEvent { origin, record })
            .collect()
    }
}
