// src/clock.rs
use chrono::{Local, NaiveDateTime};

/// Fonte da hora local. Injetada no AppState para os testes poderem mudar o dia.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Relógio parado, ajustável a partir do teste.
#[cfg(test)]
#[derive(Debug)]
pub struct FixedClock(parking_lot::Mutex<NaiveDateTime>);

#[cfg(test)]
impl FixedClock {
    pub fn at(date_time: &str) -> Self {
        let parsed = NaiveDateTime::parse_from_str(date_time, "%Y-%m-%d %H:%M:%S")
            .expect("data de teste inválida");
        Self(parking_lot::Mutex::new(parsed))
    }

    pub fn advance(&self, by: chrono::Duration) {
        *self.0.lock() += by;
    }
}

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.0.lock()
    }
}
