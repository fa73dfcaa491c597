/*
 *  main.rs
 *
 *  LyMonS - worth the squeeze
 *	(c) 2020-26 Stuart Hunter
 *
 *	Frame server: one refresh worker renders, HTTP serves the cached frame
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::{error, info, warn};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use lymons_frame::config::{self, Cli};
use lymons_frame::frame::{FrameCache, RenderOptions};
use lymons_frame::http::{self, AppState};
use lymons_frame::render::StatusPageRenderer;
use lymons_frame::sources::{LmsClient, LmsMusicSource, LocationStore};
use lymons_frame::worker::RefreshWorker;

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

#[cfg(unix)]
async fn signal_handler() -> std::io::Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT received. Initiating graceful shutdown.");
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received. Initiating graceful shutdown.");
        }
        _ = sighup.recv() => {
            info!("SIGHUP received. Initiating graceful shutdown.");
        }
    }
    Ok(())
}

#[cfg(not(unix))]
async fn signal_handler() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await?;
    info!("Ctrl-C received. Initiating graceful shutdown.");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load(&cli).context("loading configuration")?;

    if cli.dump_config {
        print!("{}", serde_yaml::to_string(&cfg).context("serializing configuration")?);
        return Ok(());
    }

    // --debug / --log-level are already folded into the merged config
    let level = cfg.log_level.clone().unwrap_or_else(|| "info".to_string());
    env_logger::Builder::from_env(Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();

    info!("This {} worth the Squeeze", env!("CARGO_PKG_NAME"));
    info!("v.{} built {}", env!("CARGO_PKG_VERSION"), BUILD_DATE);

    let cache = Arc::new(FrameCache::new(RenderOptions::new(cfg.initial_dither(), 100)));

    let music = match cfg.lms_endpoint() {
        Some((host, port, player)) => {
            let client = LmsClient::new(&host, port).context("creating LMS client")?;
            info!("Music from LMS {} player {}", client.base_url(), player);
            Some(LmsMusicSource::new(client, &player))
        }
        None => {
            warn!("No LMS host configured, music will render as idle");
            None
        }
    };

    let locations = Arc::new(match cfg.static_location() {
        Some((lat, lon, name)) => LocationStore::with_fallback(lat, lon, name).context("configured location")?,
        None => LocationStore::new(),
    });

    let (width, height) = cfg.display_size();
    let renderer = StatusPageRenderer::new(width, height).context("display geometry")?;
    info!("Rendering {}x{} frames", width, height);

    let shutdown = CancellationToken::new();
    let worker = RefreshWorker::new(
        cache.clone(),
        music,
        locations.clone(),
        renderer,
        cfg.refresh_config(),
    )
    .spawn(shutdown.child_token());

    let bind = cfg.bind_addr()?;
    let listener = TcpListener::bind(bind).await.with_context(|| format!("binding {bind}"))?;
    let server = tokio::spawn(http::serve(
        listener,
        AppState { cache, locations },
        shutdown.child_token(),
    ));

    if let Err(e) = signal_handler().await {
        error!("Signal handling failed: {}", e);
    }
    shutdown.cancel();

    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("HTTP server error: {}", e),
        Err(e) => error!("HTTP server task failed: {}", e),
    }
    if let Err(e) = worker.await {
        error!("Refresh worker task failed: {}", e);
    }

    info!("Shutdown complete.");
    Ok(())
}
