//! Assertion helpers that log each check and its outcome
//!
//! Every line goes through `tracing` at info level and is echoed to stdout
//! with ANSI colours, so a run reads the same in the log file and the terminal.

use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;

use nu_ansi_term::Color;
use tracing::info;

const HEADER_RULE: &str = "====================";

fn emit(line: &str, indent: &str, color: Color) {
    info!("{}", line);
    println!("{}", color.paint(format!("{}{}", indent, line)));
}

/// Log a `==== message ====` header line
pub fn log_header(message: &str) {
    let line = format!("{} {} {}", HEADER_RULE, message, HEADER_RULE);
    info!("{}", line);
    println!("{}", Color::Cyan.paint(format!("\n{}", line)));
}

/// Anything [`LoggedCase::assert_in_with_log`] can look a member up in
pub trait Container<M: ?Sized> {
    fn has_member(&self, member: &M) -> bool;
}

impl Container<str> for str {
    fn has_member(&self, member: &str) -> bool {
        self.contains(member)
    }
}

impl Container<str> for String {
    fn has_member(&self, member: &str) -> bool {
        self.contains(member)
    }
}

impl<T: PartialEq> Container<T> for [T] {
    fn has_member(&self, member: &T) -> bool {
        self.contains(member)
    }
}

impl<T: PartialEq> Container<T> for Vec<T> {
    fn has_member(&self, member: &T) -> bool {
        self.contains(member)
    }
}

impl<K, Q, V> Container<Q> for HashMap<K, V>
where
    K: Borrow<Q> + Eq + Hash,
    Q: Eq + Hash + ?Sized,
{
    fn has_member(&self, member: &Q) -> bool {
        self.contains_key(member)
    }
}

impl<K, Q, V> Container<Q> for BTreeMap<K, V>
where
    K: Borrow<Q> + Ord,
    Q: Ord + ?Sized,
{
    fn has_member(&self, member: &Q) -> bool {
        self.contains_key(member)
    }
}

impl<T, Q> Container<Q> for HashSet<T>
where
    T: Borrow<Q> + Eq + Hash,
    Q: Eq + Hash + ?Sized,
{
    fn has_member(&self, member: &Q) -> bool {
        self.contains(member)
    }
}

/// One running test case.
///
/// Creating it logs `STARTING TEST: <name>`; dropping it, including while a
/// failed assertion unwinds, logs `COMPLETED TEST: <name>`.
#[derive(Debug)]
pub struct LoggedCase {
    name: String,
}

impl LoggedCase {
    pub fn start(name: impl Into<String>) -> Self {
        let name = name.into();
        info!("STARTING TEST: {}", name);
        println!("{}", Color::Green.paint(format!("\nSTARTING TEST: {}", name)));
        Self { name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn log_header(&self, message: &str) {
        log_header(message);
    }

    pub fn log_step(&self, message: &str) {
        emit(&format!("STEP: {}", message), "  ", Color::Blue);
    }

    pub fn log_check(&self, message: &str) {
        emit(&format!("CHECK: {}", message), "    ", Color::Magenta);
    }

    pub fn log_result(&self, message: &str, success: bool) {
        let color = if success { Color::Green } else { Color::Red };
        emit(&format!("RESULT: {}", message), "      ", color);
    }

    /// Assert `condition`, logging the check and its outcome.
    /// Panics with `message` like `assert!` when the condition is false.
    pub fn assert_with_log(
        &self,
        condition: bool,
        message: &str,
        success_message: Option<&str>,
    ) -> bool {
        self.log_check(message);
        if !condition {
            self.log_result(&format!("Assertion failed: {}", message), false);
        }
        assert!(condition, "{}", message);
        self.log_result(success_message.unwrap_or("Assertion passed"), true);
        true
    }

    /// Assert equality, logging the check and its outcome.
    /// Panics like `assert_eq!` with `message` when the values differ.
    pub fn assert_equal_with_log<T>(
        &self,
        first: T,
        second: T,
        message: &str,
        success_message: Option<&str>,
    ) -> bool
    where
        T: PartialEq + Debug,
    {
        self.log_check(message);
        if first != second {
            self.log_result(
                &format!("Equality assertion failed: {:?} != {:?}", first, second),
                false,
            );
        }
        assert_eq!(first, second, "{}", message);
        match success_message {
            Some(success) => self.log_result(success, true),
            None => self.log_result(
                &format!("Equality assertion passed: {:?} == {:?}", first, second),
                true,
            ),
        }
        true
    }

    /// Assert that `container` holds `member` (substring, element or map key)
    pub fn assert_in_with_log<M, C>(
        &self,
        member: &M,
        container: &C,
        message: &str,
        success_message: Option<&str>,
    ) -> bool
    where
        M: Debug + ?Sized,
        C: Container<M> + Debug + ?Sized,
    {
        self.log_check(message);
        let found = container.has_member(member);
        if !found {
            self.log_result(
                &format!("Membership assertion failed: {:?} is not in the container", member),
                false,
            );
        }
        assert!(found, "{:?} not found in {:?} : {}", member, container, message);
        match success_message {
            Some(success) => self.log_result(success, true),
            None => self.log_result(
                &format!("Membership assertion passed: {:?} is in the container", member),
                true,
            ),
        }
        true
    }
}

impl Drop for LoggedCase {
    fn drop(&mut self) {
        info!("COMPLETED TEST: {}", self.name);
        println!("{}", Color::Green.paint(format!("COMPLETED TEST: {}", self.name)));
    }
}
