/*
 * Copyright 2025 Security Union LLC
 *
 * Licensed under either of
 *
 * * Apache License, Version 2.0
 *   (http://www.apache.org/licenses/LICENSE-2.0)
 * * MIT license
 *   (http://opensource.org/licenses/MIT)
 *
 * at your option.
 */

//! WASM (browser) platform primitives.

use std::time::Duration;

/// Suspend for `duration` using a `setTimeout`-backed future.
pub async fn sleep(duration: Duration) {
    gloo_timers::future::sleep(duration).await;
}
