use crate::application::reporting::TransactionStatistics;
use crate::domain::money::Balance;
use crate::domain::transaction::UserId;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

/// One line of the end-of-session report.
#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct UserReport {
    pub user: UserId,
    pub balance: Decimal,
    pub transactions: usize,
    pub completed: usize,
    pub pending: usize,
    pub failed: usize,
    pub total_spent: Decimal,
    pub total_refunded: Decimal,
    pub net_spent: Decimal,
    pub success_rate: Decimal,
}

impl UserReport {
    pub fn new(user: UserId, balance: Balance, stats: &TransactionStatistics) -> Self {
        Self {
            user,
            balance: balance.value().normalize(),
            transactions: stats.total,
            completed: stats.completed,
            pending: stats.pending,
            failed: stats.failed,
            total_spent: stats.total_spent.normalize(),
            total_refunded: stats.total_refunded.normalize(),
            net_spent: stats.net_spent.normalize(),
            success_rate: stats.success_rate.normalize(),
        }
    }
}

pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    /// Writes the header followed by one row per user, then flushes.
    pub fn write_reports<I>(&mut self, reports: I) -> csv::Result<()>
    where
        I: IntoIterator<Item = UserReport>,
    {
        for report in reports {
            self.writer.serialize(report)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
