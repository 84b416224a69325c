//! The hostfxr entry points an apphost calls.
//!
//! Each export reads its raw arguments, lets the core decide what to forward
//! and calls the same export of the genuine hostfxr. The caller's
//! `dotnet_root` is replaced by the resolved one.

use std::path::PathBuf;

use hookfxr_core::pal::{self, PalChar, PalString};
use hookfxr_core::ProxyExport;

use crate::context;

type MainStartupInfoFn = unsafe extern "C" fn(
    argc: i32,
    argv: *const *const PalChar,
    host_path: *const PalChar,
    dotnet_root: *const PalChar,
    app_path: *const PalChar,
) -> i32;

type MainBundleStartupInfoFn = unsafe extern "C" fn(
    argc: i32,
    argv: *const *const PalChar,
    host_path: *const PalChar,
    dotnet_root: *const PalChar,
    app_path: *const PalChar,
    bundle_header_offset: i64,
) -> i32;

#[no_mangle]
pub unsafe extern "C" fn hostfxr_main(_argc: i32, _argv: *const *const PalChar) -> i32 {
    context().proxy().main()
}

#[no_mangle]
pub unsafe extern "C" fn hostfxr_main_startupinfo(
    argc: i32,
    argv: *const *const PalChar,
    host_path: *const PalChar,
    _dotnet_root: *const PalChar,
    app_path: *const PalChar,
) -> i32 {
    let app = app_path_arg(app_path);

    context().forward(ProxyExport::MainStartupInfo, &app, |target| {
        let entry: MainStartupInfoFn = std::mem::transmute(target.entry.as_ptr());
        let dotnet_root = PalString::from_path(target.dotnet_root);
        let app_path = PalString::from_path(target.app_path);
        entry(argc, argv, host_path, dotnet_root.as_ptr(), app_path.as_ptr())
    })
}

#[no_mangle]
pub unsafe extern "C" fn hostfxr_main_bundle_startupinfo(
    argc: i32,
    argv: *const *const PalChar,
    host_path: *const PalChar,
    _dotnet_root: *const PalChar,
    app_path: *const PalChar,
    bundle_header_offset: i64,
) -> i32 {
    let app = app_path_arg(app_path);

    context().forward(ProxyExport::MainBundleStartupInfo, &app, |target| {
        let entry: MainBundleStartupInfoFn = std::mem::transmute(target.entry.as_ptr());
        let dotnet_root = PalString::from_path(target.dotnet_root);
        let app_path = PalString::from_path(target.app_path);
        entry(
            argc,
            argv,
            host_path,
            dotnet_root.as_ptr(),
            app_path.as_ptr(),
            bundle_header_offset,
        )
    })
}

/// A null app path is treated as empty.
unsafe fn app_path_arg(app_path: *const PalChar) -> PathBuf {
    pal::path_from_ptr(app_path).unwrap_or_default()
}
