//! Vulkanの各Objectを参照カウンタで管理して、参照がすべて破棄された際に
//! 自動で各種destroy処理を行うようにしたラッパーの構造体の各種Handleを用意している。
//!
//! 参照カウントの実装には「詳解 Rustアトミック操作とロック ―並行処理実装のための低レイヤプログラミング」の
//! Arcの実装を参考にしている。
//! メモリのOrderingなどは、それに準拠している。

mod instance;
pub use instance::InstanceHandle;
mod surface;
pub use surface::SurfaceHandle;
mod device;
pub use device::DeviceHandle;
