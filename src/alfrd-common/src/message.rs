//! Console output macros. Every line is prefixed with a padded, coloured tag so
//! status output from project commands and sheet pushes lines up in a terminal.

#[doc(hidden)]
#[macro_export]
macro_rules! __tagged_message {
    (stdout, $tag:expr, $($arg:tt)*) => {
        println!("{} {}", $tag, format!($($arg)*))
    };
    (stderr, $tag:expr, $($arg:tt)*) => {
        eprintln!("{} {}", $tag, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! success_message {
    ($($arg:tt)*) => {
        $crate::__tagged_message!(stdout, "[ DONE ]".green().bold(), $($arg)*)
    };
}

#[macro_export]
macro_rules! error_message {
    ($($arg:tt)*) => {
        $crate::__tagged_message!(stderr, "[FAILED]".red().bold(), $($arg)*)
    };
}

#[macro_export]
macro_rules! warning_message {
    ($($arg:tt)*) => {
        $crate::__tagged_message!(stdout, "[ WARN ]".yellow().bold(), $($arg)*)
    };
}

#[macro_export]
macro_rules! info_message {
    ($($arg:tt)*) => {
        $crate::__tagged_message!(stdout, "[ INFO ]".cyan().bold(), $($arg)*)
    };
}

/// Used when a push or write was deliberately not performed.
#[macro_export]
macro_rules! skip_message {
    ($($arg:tt)*) => {
        $crate::__tagged_message!(stdout, "[ SKIP ]".dimmed(), $($arg)*)
    };
}
